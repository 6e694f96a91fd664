//! `/api/v1/boxes/{id}/archive` — tar archive transfer in and out of a box.
//! Streams both directions rather than buffering the whole tarball.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use gbox_driver::ExtractOptions;
use serde::Deserialize;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let (reader, stat) = state.box_service.get_archive(&id, &query.path).await?;
    let stat_json = serde_json::to_string(&stat).unwrap_or_default();

    let mut response = Response::new(Body::from_stream(ReaderStream::new(reader)));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-tar"));
    response.headers_mut().insert(
        "X-Gbox-Path-Stat",
        HeaderValue::from_str(&stat_json).unwrap_or_else(|_| HeaderValue::from_static("{}")),
    );
    Ok(response)
}

pub async fn head(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let stat = state.box_service.head_archive(&id, &query.path).await?;
    let stat_json = serde_json::to_string(&stat).unwrap_or_default();

    let mut headers = HeaderMap::new();
    headers.insert(
        "X-Gbox-Path-Stat",
        HeaderValue::from_str(&stat_json).unwrap_or_else(|_| HeaderValue::from_static("{}")),
    );
    Ok((StatusCode::OK, headers).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PutQuery {
    pub path: String,
    #[serde(default, rename = "noOverwriteDirNonDir")]
    pub no_overwrite_dir_non_dir: bool,
    #[serde(default, rename = "copyUIDGID")]
    pub copy_uid_gid: bool,
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PutQuery>,
    body: Body,
) -> Result<StatusCode, ApiError> {
    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    let reader: gbox_driver::ArchiveReader = Box::pin(StreamReader::new(stream));

    state
        .box_service
        .extract_archive(
            &id,
            &query.path,
            reader,
            ExtractOptions {
                no_overwrite_dir_non_dir: query.no_overwrite_dir_non_dir,
                copy_uid_gid: query.copy_uid_gid,
            },
        )
        .await?;
    Ok(StatusCode::OK)
}
