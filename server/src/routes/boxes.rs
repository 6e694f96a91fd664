//! `/api/v1/boxes*` — box lifecycle routes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use gbox_driver::{CreateBoxRequest, Filter, FilterField};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub id: Option<String>,
    pub label_key: Option<String>,
    pub label_value: Option<String>,
    pub ancestor: Option<String>,
}

impl ListQuery {
    fn into_filters(self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(id) = self.id {
            filters.push(Filter { field: FilterField::Id(id) });
        }
        if self.label_key.is_some() || self.label_value.is_some() {
            filters.push(Filter {
                field: FilterField::Label(self.label_key, self.label_value),
            });
        }
        if let Some(ancestor) = self.ancestor {
            filters.push(Filter { field: FilterField::Ancestor(ancestor) });
        }
        filters
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<gbox_driver::Box>>, ApiError> {
    let boxes = state.box_service.list(&query.into_filters()).await?;
    Ok(Json(boxes))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<gbox_driver::Box>, ApiError> {
    let b = state.box_service.get(&id).await?;
    Ok(Json(b))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBoxRequest>,
) -> Result<(StatusCode, Json<gbox_driver::Box>), ApiError> {
    let b = state.box_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(b)))
}

#[derive(Debug, Deserialize, Default)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ForceQuery>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.box_service.delete(&id, query.force).await?;
    Ok(Json(MessageResponse {
        message: format!("box {id} deleted"),
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    pub count: usize,
    pub ids: Vec<String>,
    pub message: String,
}

pub async fn delete_all(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ForceQuery>,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    let (ids, count) = state.box_service.delete_all(query.force).await?;
    Ok(Json(DeleteAllResponse {
        message: format!("deleted {count} box(es)"),
        ids,
        count,
    }))
}

#[derive(Debug, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

pub async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ActionResult>, ApiError> {
    state.box_service.start(&id).await?;
    Ok(Json(ActionResult {
        success: true,
        message: format!("box {id} started"),
    }))
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ActionResult>, ApiError> {
    state.box_service.stop(&id).await?;
    Ok(Json(ActionResult {
        success: true,
        message: format!("box {id} stopped"),
    }))
}
