//! `POST /api/v1/boxes/reclaim` — trigger an out-of-band reclamation pass,
//! on top of the periodic background sweep `main` already spawns.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ReclaimResponse {
    pub stopped_ids: Vec<String>,
    pub deleted_ids: Vec<String>,
    pub stopped_count: usize,
    pub deleted_count: usize,
    pub message: String,
}

pub async fn reclaim(State(state): State<Arc<AppState>>) -> Json<ReclaimResponse> {
    let report = state.reclaimer.reclaim_once().await;
    Json(ReclaimResponse {
        stopped_count: report.stopped_ids.len(),
        deleted_count: report.deleted_ids.len(),
        message: report.message(),
        stopped_ids: report.stopped_ids,
        deleted_ids: report.deleted_ids,
    })
}
