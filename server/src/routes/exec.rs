//! `/api/v1/boxes/{id}/exec` and `/run` — streaming and one-shot command
//! execution.
//!
//! The exec route hijacks the underlying connection the same way this
//! codebase's CRI streaming server takes over a raw TCP socket: parse the
//! request body for the `ExecSpec`, reply `101 Switching Protocols`, then
//! hand the upgraded connection to [`crate::stream_adapter::bridge`].
//! `axum`/`hyper` expose this as `hyper::upgrade::on`, the same primitive
//! `axum::extract::WebSocketUpgrade` is built on, used here directly since
//! the wire format isn't WebSocket framing.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Json;
use gbox_driver::ExecSpec;
use hyper_util::rt::TokioIo;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

const RAW_STREAM: &str = "application/vnd.gbox.raw-stream";
const MULTIPLEXED_STREAM: &str = "application/vnd.gbox.multiplexed-stream";

pub async fn exec(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request<Body>,
) -> Result<Response, ApiError> {
    let accept = request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(RAW_STREAM)
        .to_string();

    if accept != RAW_STREAM && accept != MULTIPLEXED_STREAM {
        return Err(ApiError(
            StatusCode::NOT_ACCEPTABLE,
            crate::error::ErrorBody {
                code: "unsupported_media_type",
                message: format!("unsupported Accept header: {accept}"),
            },
        ));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| internal(e.to_string()))?;
    let mut spec: ExecSpec = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError(StatusCode::BAD_REQUEST, crate::error::ErrorBody {
            code: "invalid_request",
            message: format!("invalid exec body: {e}"),
        }))?;
    spec.tty = accept == RAW_STREAM;

    let attach = state.box_service.exec(&id, spec).await?;
    let driver = state.box_service.driver();

    let upgrade_request = Request::from_parts(parts, Body::empty());
    tokio::spawn(async move {
        match hyper::upgrade::on(upgrade_request).await {
            Ok(upgraded) => {
                let io = TokioIo::new(upgraded);
                crate::stream_adapter::bridge(io, attach, driver).await;
            }
            Err(e) => warn!(error = %e, "exec: failed to take over connection"),
        }
    });

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    response
        .headers_mut()
        .insert(header::CONNECTION, "Upgrade".parse().unwrap());
    response
        .headers_mut()
        .insert(header::UPGRADE, accept.parse().unwrap());
    Ok(response)
}

#[derive(Debug, serde::Deserialize)]
pub struct RunRequestBody {
    pub cmd: Vec<String>,
    #[serde(default)]
    pub env: std::collections::BTreeMap<String, String>,
    pub working_dir: Option<String>,
    #[serde(default = "default_line_limit")]
    pub stdout_line_limit: i64,
    #[serde(default = "default_line_limit")]
    pub stderr_line_limit: i64,
}

fn default_line_limit() -> i64 {
    gbox_service::service::DEFAULT_LINE_LIMIT
}

#[derive(Debug, serde::Serialize)]
pub struct RunResponseBody {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RunRequestBody>,
) -> Result<Json<RunResponseBody>, ApiError> {
    let output = state
        .box_service
        .run(
            &id,
            gbox_service::RunRequest {
                cmd: req.cmd,
                env: req.env,
                working_dir: req.working_dir,
                stdout_line_limit: req.stdout_line_limit,
                stderr_line_limit: req.stderr_line_limit,
            },
        )
        .await?;

    Ok(Json(RunResponseBody {
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
    }))
}

fn internal(message: String) -> ApiError {
    ApiError(
        StatusCode::INTERNAL_SERVER_ERROR,
        crate::error::ErrorBody { code: "internal", message },
    )
}
