//! Periodic reclamation: stop boxes idle past one threshold, delete boxes
//! idle past a longer one. Driven by a `tokio::time::interval`; grounded
//! structurally on this codebase's background-task spawn idiom and on the
//! bounded retry loop's "log and keep going, never propagate a single
//! failure" discipline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gbox_core::tracker::AccessTracker;
use gbox_driver::{BoxStatus, Driver, DriverError};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ReclaimReport {
    pub stopped_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
}

impl ReclaimReport {
    pub fn message(&self) -> String {
        format!(
            "stopped {} box(es), deleted {} box(es)",
            self.stopped_ids.len(),
            self.deleted_ids.len()
        )
    }
}

pub struct Reclaimer {
    driver: Arc<dyn Driver>,
    tracker: Arc<AccessTracker>,
    stop_threshold: chrono::Duration,
    delete_threshold: chrono::Duration,
}

impl Reclaimer {
    pub fn new(
        driver: Arc<dyn Driver>,
        tracker: Arc<AccessTracker>,
        stop_threshold: Duration,
        delete_threshold: Duration,
    ) -> Self {
        Self {
            driver,
            tracker,
            stop_threshold: chrono::Duration::from_std(stop_threshold)
                .unwrap_or_else(|_| chrono::Duration::seconds(1800)),
            delete_threshold: chrono::Duration::from_std(delete_threshold)
                .unwrap_or_else(|_| chrono::Duration::seconds(86_400)),
        }
    }

    /// Spawn the periodic reclamation loop; returns its join handle so the
    /// caller can abort it on shutdown.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let report = self.reclaim_once().await;
                info!(
                    stopped = report.stopped_ids.len(),
                    deleted = report.deleted_ids.len(),
                    "reclamation pass complete"
                );
            }
        })
    }

    /// Run a single reclamation pass. Stop runs before delete so a box
    /// crossing both thresholds since the last pass is handled in one go.
    pub async fn reclaim_once(&self) -> ReclaimReport {
        let mut report = ReclaimReport::default();

        let boxes = match self.driver.list(&[]).await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "reclaimer: listing boxes failed, skipping pass");
                return report;
            }
        };

        let now = Utc::now();
        let existing_ids: std::collections::HashSet<String> =
            boxes.iter().map(|b| b.id.clone()).collect();

        for id in self.tracker.tracked_ids() {
            if !existing_ids.contains(&id) {
                self.tracker.remove(&id);
            }
        }
        for b in &boxes {
            self.tracker.get_last_accessed(&b.id);
        }

        for b in &boxes {
            let last_accessed = self.tracker.get_last_accessed(&b.id);
            let idle = now - last_accessed;

            if idle >= self.stop_threshold && b.status == BoxStatus::Running {
                match self.driver.stop(&b.id).await {
                    Ok(_) | Err(DriverError::AlreadyStopped(_)) => {
                        self.tracker.update(&b.id);
                        report.stopped_ids.push(b.id.clone());
                    }
                    Err(e) => {
                        warn!(box_id = %b.id, error = %e, "reclaimer: stop failed, continuing");
                    }
                }
            }

            if idle >= self.delete_threshold {
                match self.driver.delete(&b.id, true).await {
                    Ok(()) => {
                        self.tracker.remove(&b.id);
                        report.deleted_ids.push(b.id.clone());
                    }
                    Err(e) => {
                        warn!(box_id = %b.id, error = %e, "reclaimer: delete failed, continuing");
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gbox_driver::{
        ArchiveReader, CreateBoxRequest, DriverError, ExecAttach, ExecHandle, ExecSpec, Filter,
        PathStat, Result as DriverResult,
    };
    use std::sync::Mutex;

    struct FakeDriver {
        boxes: Mutex<Vec<gbox_driver::Box>>,
        stopped: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Driver for FakeDriver {
        async fn list(&self, _filters: &[Filter]) -> DriverResult<Vec<gbox_driver::Box>> {
            Ok(self.boxes.lock().unwrap().clone())
        }
        async fn get(&self, id: &str) -> DriverResult<gbox_driver::Box> {
            self.boxes
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.id == id)
                .cloned()
                .ok_or_else(|| DriverError::NotFound(id.to_string()))
        }
        async fn create(&self, _req: CreateBoxRequest) -> DriverResult<gbox_driver::Box> {
            unimplemented!()
        }
        async fn start(&self, _id: &str) -> DriverResult<BoxStatus> {
            unimplemented!()
        }
        async fn stop(&self, id: &str) -> DriverResult<BoxStatus> {
            self.stopped.lock().unwrap().push(id.to_string());
            if let Some(b) = self.boxes.lock().unwrap().iter_mut().find(|b| b.id == id) {
                b.status = BoxStatus::Stopped;
            }
            Ok(BoxStatus::Stopped)
        }
        async fn delete(&self, id: &str, _force: bool) -> DriverResult<()> {
            self.deleted.lock().unwrap().push(id.to_string());
            self.boxes.lock().unwrap().retain(|b| b.id != id);
            Ok(())
        }
        async fn delete_all(&self, _force: bool) -> DriverResult<(Vec<String>, usize)> {
            unimplemented!()
        }
        async fn exec(&self, _id: &str, _req: ExecSpec) -> DriverResult<ExecAttach> {
            unimplemented!()
        }
        async fn inspect_exec(&self, _handle: &ExecHandle) -> DriverResult<i64> {
            unimplemented!()
        }
        async fn get_archive(&self, _id: &str, _path: &str) -> DriverResult<(ArchiveReader, PathStat)> {
            unimplemented!()
        }
        async fn head_archive(&self, _id: &str, _path: &str) -> DriverResult<PathStat> {
            unimplemented!()
        }
        async fn extract_archive(
            &self,
            _id: &str,
            _path: &str,
            _tar: ArchiveReader,
            _opts: gbox_driver::ExtractOptions,
        ) -> DriverResult<()> {
            unimplemented!()
        }
        async fn get_external_port(&self, _id: &str, _port: u16) -> DriverResult<u16> {
            unimplemented!()
        }
    }

    fn make_box(id: &str, status: BoxStatus) -> gbox_driver::Box {
        gbox_driver::Box {
            id: id.to_string(),
            image: "alpine".to_string(),
            status,
            labels: Default::default(),
            cmd: None,
            args: None,
            working_dir: None,
            env: None,
            mounts: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn idle_running_box_past_stop_threshold_gets_stopped() {
        let driver = Arc::new(FakeDriver {
            boxes: Mutex::new(vec![make_box("b1", BoxStatus::Running)]),
            stopped: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
        });
        let tracker = Arc::new(AccessTracker::new());
        tracker.set_last_accessed("b1", Utc::now() - chrono::Duration::seconds(120));

        let reclaimer = Reclaimer::new(
            driver.clone(),
            tracker,
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        let report = reclaimer.reclaim_once().await;
        assert_eq!(report.stopped_ids, vec!["b1".to_string()]);
        assert!(report.deleted_ids.is_empty());
    }

    #[tokio::test]
    async fn box_past_both_thresholds_is_stopped_then_deleted_in_one_pass() {
        let driver = Arc::new(FakeDriver {
            boxes: Mutex::new(vec![make_box("b2", BoxStatus::Running)]),
            stopped: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
        });
        let tracker = Arc::new(AccessTracker::new());
        tracker.set_last_accessed("b2", Utc::now() - chrono::Duration::seconds(7200));

        let reclaimer = Reclaimer::new(
            driver.clone(),
            tracker,
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        let report = reclaimer.reclaim_once().await;
        assert_eq!(report.stopped_ids, vec!["b2".to_string()]);
        assert_eq!(report.deleted_ids, vec!["b2".to_string()]);
    }

    #[tokio::test]
    async fn box_removed_externally_is_forgotten_without_error() {
        let driver = Arc::new(FakeDriver {
            boxes: Mutex::new(vec![]),
            stopped: Mutex::new(vec![]),
            deleted: Mutex::new(vec![]),
        });
        let tracker = Arc::new(AccessTracker::new());
        tracker.update("ghost");

        let reclaimer = Reclaimer::new(
            driver,
            tracker.clone(),
            Duration::from_secs(60),
            Duration::from_secs(3600),
        );
        let report = reclaimer.reclaim_once().await;
        assert!(report.stopped_ids.is_empty());
        assert!(tracker.tracked_ids().is_empty());
    }
}
