//! Service-level error taxonomy — the one error type the HTTP boundary
//! needs to know about. Retargets the same "one thiserror enum, one
//! mapping function to a wire status code" shape this codebase used for
//! its gRPC surface, aimed at plain HTTP status codes instead.

use gbox_driver::DriverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("box not found: {0}")]
    BoxNotFound(String),

    #[error("box is not running: {0}")]
    BoxNotRunning(String),

    #[error("box is already running: {0}")]
    BoxAlreadyRunning(String),

    #[error("box is already stopped: {0}")]
    BoxAlreadyStopped(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("context not found: {0}")]
    ContextNotFound(String),

    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// A status code, independent of which HTTP crate renders it — kept as a
/// plain integer here so this crate doesn't need to depend on axum.
impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InvalidRequest(_) => 400,
            ServiceError::BoxNotFound(_) => 404,
            ServiceError::BoxNotRunning(_) => 409,
            ServiceError::BoxAlreadyRunning(_) => 400,
            ServiceError::BoxAlreadyStopped(_) => 400,
            ServiceError::UnsupportedMediaType(_) => 406,
            ServiceError::NotImplemented(_) => 501,
            ServiceError::Conflict(_) => 409,
            ServiceError::ContextNotFound(_) => 404,
            ServiceError::PageNotFound(_) => 404,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable tag for the JSON error body.
    pub fn code_tag(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequest(_) => "invalid_request",
            ServiceError::BoxNotFound(_) => "box_not_found",
            ServiceError::BoxNotRunning(_) => "box_not_running",
            ServiceError::BoxAlreadyRunning(_) => "box_already_running",
            ServiceError::BoxAlreadyStopped(_) => "box_already_stopped",
            ServiceError::UnsupportedMediaType(_) => "unsupported_media_type",
            ServiceError::NotImplemented(_) => "not_implemented",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::ContextNotFound(_) => "context_not_found",
            ServiceError::PageNotFound(_) => "page_not_found",
            ServiceError::Internal(_) => "internal",
        }
    }
}

impl From<DriverError> for ServiceError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::NotFound(id) => ServiceError::BoxNotFound(id),
            DriverError::NotRunning(id) => ServiceError::BoxNotRunning(id),
            DriverError::AlreadyRunning(id) => ServiceError::BoxAlreadyRunning(id),
            DriverError::AlreadyStopped(id) => ServiceError::BoxAlreadyStopped(id),
            DriverError::Conflict(msg) => ServiceError::Conflict(msg),
            DriverError::NotImplemented(msg) => ServiceError::NotImplemented(msg),
            DriverError::PathNotFound(msg) => ServiceError::BoxNotFound(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = ServiceError::BoxNotFound("abc".to_string());
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn not_running_maps_to_409() {
        let err = ServiceError::BoxNotRunning("abc".to_string());
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn already_running_maps_to_400() {
        let err = ServiceError::BoxAlreadyRunning("abc".to_string());
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn not_implemented_maps_to_501() {
        let err = ServiceError::NotImplemented("cluster stop".to_string());
        assert_eq!(err.status_code(), 501);
    }

    #[test]
    fn driver_not_found_converts_to_box_not_found() {
        let err: ServiceError = DriverError::NotFound("xyz".to_string()).into();
        assert!(matches!(err, ServiceError::BoxNotFound(_)));
    }
}
