//! Translates `ServiceError`/`BrowserError` into the `{code, message}` JSON
//! body this codebase's CRI boundary produced as a `tonic::Status` —
//! retargeted at `axum::http::StatusCode` since this boundary is plain HTTP.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gbox_browser::BrowserError;
use gbox_service::ServiceError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

pub struct ApiError(pub StatusCode, pub ErrorBody);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        ApiError(
            status,
            ErrorBody {
                code: err.code_tag(),
                message: err.to_string(),
            },
        )
    }
}

/// The browser subsystem doesn't carry its own HTTP status mapping (it's
/// reached only from a handful of routes), so its kinds are folded into the
/// same error-kind taxonomy the service layer uses.
impl From<BrowserError> for ApiError {
    fn from(err: BrowserError) -> Self {
        let (status, code) = match err {
            BrowserError::BoxNotRunning(_) => (StatusCode::CONFLICT, "box_not_running"),
            BrowserError::BrowserNotFound(_) => (StatusCode::NOT_FOUND, "browser_not_found"),
            BrowserError::ContextNotFound(_) => (StatusCode::NOT_FOUND, "context_not_found"),
            BrowserError::PageNotFound(_) => (StatusCode::NOT_FOUND, "page_not_found"),
            BrowserError::ConnectFailed { .. } => (StatusCode::BAD_GATEWAY, "connect_failed"),
            BrowserError::NavigationFailed(_) => (StatusCode::BAD_GATEWAY, "navigation_failed"),
            BrowserError::UnknownAction(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            BrowserError::Cdp(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            BrowserError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        ApiError(
            status,
            ErrorBody {
                code,
                message: err.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_not_found_maps_to_404() {
        let err: ApiError = ServiceError::BoxNotFound("abc".to_string()).into();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert_eq!(err.1.code, "box_not_found");
    }

    #[test]
    fn browser_page_not_found_maps_to_404() {
        let err: ApiError = BrowserError::PageNotFound("p1".to_string()).into();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }
}
