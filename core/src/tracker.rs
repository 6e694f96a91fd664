//! In-memory last-accessed tracking for boxes.
//!
//! No persistence: a process restart forgets every access record, which is
//! fine since the boxes themselves don't survive a restart either.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Tracks the most recent access time for each box id.
#[derive(Debug, Default)]
pub struct AccessTracker {
    records: DashMap<String, DateTime<Utc>>,
}

impl AccessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access against `box_id`, stamped with the current time.
    pub fn update(&self, box_id: &str) {
        self.records.insert(box_id.to_string(), Utc::now());
    }

    /// Return the last-accessed time for `box_id`, inserting `now` if this
    /// is the first time the id has been observed (e.g. a box the
    /// reclaimer discovered that predates this process).
    pub fn get_last_accessed(&self, box_id: &str) -> DateTime<Utc> {
        *self
            .records
            .entry(box_id.to_string())
            .or_insert_with(Utc::now)
    }

    /// Forget a box entirely, e.g. after it has been deleted.
    pub fn remove(&self, box_id: &str) {
        self.records.remove(box_id);
    }

    /// Force a specific last-accessed time, for reclaimer tests that need
    /// to simulate idle boxes without sleeping.
    pub fn set_last_accessed(&self, box_id: &str, at: DateTime<Utc>) {
        self.records.insert(box_id.to_string(), at);
    }

    /// Forget every box, e.g. after a delete-all.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// All tracked ids, for the reclaimer's sweep.
    pub fn tracked_ids(&self) -> Vec<String> {
        self.records.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_then_get_returns_recent_time() {
        let tracker = AccessTracker::new();
        tracker.update("box-1");
        let recorded = tracker.get_last_accessed("box-1");
        assert!(Utc::now() - recorded < chrono::Duration::seconds(1));
    }

    #[test]
    fn get_on_unknown_id_inserts_now() {
        let tracker = AccessTracker::new();
        assert!(tracker.tracked_ids().is_empty());
        tracker.get_last_accessed("box-2");
        assert_eq!(tracker.tracked_ids(), vec!["box-2".to_string()]);
    }

    #[test]
    fn remove_forgets_the_box() {
        let tracker = AccessTracker::new();
        tracker.update("box-3");
        tracker.remove("box-3");
        assert!(tracker.tracked_ids().is_empty());
    }

    #[test]
    fn clear_forgets_everything() {
        let tracker = AccessTracker::new();
        tracker.update("a");
        tracker.update("b");
        tracker.clear();
        assert!(tracker.tracked_ids().is_empty());
    }
}
