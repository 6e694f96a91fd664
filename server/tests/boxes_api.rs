//! Exercises the box lifecycle routes against an in-process router, the
//! idiomatic way to test an `axum` app without binding a real socket
//! (`tower::ServiceExt::oneshot`, per this codebase's test-tooling
//! conventions).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use gbox_browser::BrowserManager;
use gbox_core::tracker::AccessTracker;
use gbox_driver::{
    ArchiveReader, Box as GboxBox, BoxStatus, CreateBoxRequest, Driver, DriverError, ExecAttach,
    ExecHandle, ExecSpec, ExtractOptions, Filter, PathStat, Result as DriverResult,
};
use gbox_server::state::AppState;
use gbox_service::{BoxService, Reclaimer};
use tower::ServiceExt;

struct FakeDriver {
    boxes: Mutex<Vec<GboxBox>>,
}

#[async_trait]
impl Driver for FakeDriver {
    async fn list(&self, _filters: &[Filter]) -> DriverResult<Vec<GboxBox>> {
        Ok(self.boxes.lock().unwrap().clone())
    }
    async fn get(&self, id: &str) -> DriverResult<GboxBox> {
        self.boxes
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| DriverError::NotFound(id.to_string()))
    }
    async fn create(&self, req: CreateBoxRequest) -> DriverResult<GboxBox> {
        let b = GboxBox {
            id: "new-box".to_string(),
            image: req.image,
            status: BoxStatus::Creating,
            labels: req.labels,
            cmd: req.cmd,
            args: req.args,
            working_dir: req.working_dir,
            env: Some(req.env),
            mounts: Some(req.mounts),
            created_at: Utc::now(),
        };
        self.boxes.lock().unwrap().push(b.clone());
        Ok(b)
    }
    async fn start(&self, _id: &str) -> DriverResult<BoxStatus> {
        unimplemented!()
    }
    async fn stop(&self, _id: &str) -> DriverResult<BoxStatus> {
        unimplemented!()
    }
    async fn delete(&self, id: &str, _force: bool) -> DriverResult<()> {
        self.boxes.lock().unwrap().retain(|b| b.id != id);
        Ok(())
    }
    async fn delete_all(&self, _force: bool) -> DriverResult<(Vec<String>, usize)> {
        let ids: Vec<String> = self.boxes.lock().unwrap().iter().map(|b| b.id.clone()).collect();
        self.boxes.lock().unwrap().clear();
        let count = ids.len();
        Ok((ids, count))
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
        _opts: ExtractOptions,
    ) -> DriverResult<()> {
        unimplemented!()
    }
    async fn get_external_port(&self, _id: &str, _port: u16) -> DriverResult<u16> {
        unimplemented!()
    }
}

fn test_app(boxes: Vec<GboxBox>) -> axum::Router {
    let driver: Arc<dyn Driver> = Arc::new(FakeDriver { boxes: Mutex::new(boxes) });
    let tracker = Arc::new(AccessTracker::new());
    let box_service = Arc::new(BoxService::new(driver.clone(), tracker.clone()));
    let browser_manager = Arc::new(BrowserManager::new(box_service.clone(), 9222, PathBuf::from("/tmp/gbox-share")));
    let reclaimer = Arc::new(Reclaimer::new(
        driver,
        tracker,
        std::time::Duration::from_secs(1800),
        std::time::Duration::from_secs(86400),
    ));
    let state = AppState::new(
        box_service,
        browser_manager,
        reclaimer,
        None,
        PathBuf::from("/tmp/gbox-share"),
    );
    gbox_server::app(state)
}

fn make_box(id: &str) -> GboxBox {
    GboxBox {
        id: id.to_string(),
        image: "alpine".to_string(),
        status: BoxStatus::Running,
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
async fn list_boxes_returns_existing_boxes() {
    let app = test_app(vec![make_box("b1"), make_box("b2")]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/boxes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_missing_box_returns_404() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/boxes/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_box_returns_201() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/boxes")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"image":"alpine"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn create_box_with_empty_image_is_rejected() {
    let app = test_app(vec![]);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/boxes")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"image":""}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_box_removes_it() {
    let app = test_app(vec![make_box("b1")]);
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/boxes/b1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
