//! `/api/v1/boxes/{id}/browser/*` — context/page lifecycle and action
//! dispatch against a box's managed browser tree. Not part of the
//! distilled spec's representative route table, but the natural HTTP
//! surface for the browser session manager it describes in full.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use gbox_browser::{ActionRequest, ActionResponse, TabState};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub context_id: String,
}

pub async fn create_context(
    State(state): State<Arc<AppState>>,
    Path(box_id): Path<String>,
) -> Result<Json<ContextResponse>, ApiError> {
    let context = state.browser_manager.create_context(&box_id).await?;
    Ok(Json(ContextResponse { context_id: context.id.clone() }))
}

pub async fn close_context(
    State(state): State<Arc<AppState>>,
    Path((box_id, context_id)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state.browser_manager.close_context(&box_id, &context_id).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    #[serde(default = "default_blank_url")]
    pub url: String,
}

fn default_blank_url() -> String {
    "about:blank".to_string()
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub page_id: String,
}

pub async fn create_page(
    State(state): State<Arc<AppState>>,
    Path((box_id, context_id)): Path<(String, String)>,
    Json(req): Json<CreatePageRequest>,
) -> Result<Json<PageResponse>, ApiError> {
    let page = state
        .browser_manager
        .create_page(&box_id, &context_id, &req.url)
        .await?;
    Ok(Json(PageResponse { page_id: page.id.clone() }))
}

pub async fn close_page(
    State(state): State<Arc<AppState>>,
    Path((box_id, context_id, page_id)): Path<(String, String, String)>,
) -> Result<(), ApiError> {
    state
        .browser_manager
        .close_page(&box_id, &context_id, &page_id)
        .await?;
    Ok(())
}

pub async fn tab_states(
    State(state): State<Arc<AppState>>,
    Path((box_id, context_id)): Path<(String, String)>,
) -> Result<Json<Vec<TabState>>, ApiError> {
    let states = state.browser_manager.tab_states(&box_id, &context_id).await?;
    Ok(Json(states))
}

pub async fn dispatch_action(
    State(state): State<Arc<AppState>>,
    Path((box_id, context_id, page_id)): Path<(String, String, String)>,
    Json(req): Json<ActionRequest>,
) -> Json<ActionResponse> {
    let response = state
        .browser_manager
        .dispatch_action(&box_id, &context_id, &page_id, &req.action_type, &req.params)
        .await;
    Json(response)
}
