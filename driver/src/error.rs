use thiserror::Error;

/// Errors a [`crate::Driver`] implementation can return. Translated into
/// the service-level error taxonomy at the `gbox-service` boundary.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("box not found: {0}")]
    NotFound(String),

    #[error("box is not running: {0}")]
    NotRunning(String),

    #[error("box is already running: {0}")]
    AlreadyRunning(String),

    #[error("box is already stopped: {0}")]
    AlreadyStopped(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation not implemented by this driver: {0}")]
    NotImplemented(String),

    #[error("path not found in box: {0}")]
    PathNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("container backend error: {0}")]
    Bollard(#[from] bollard::errors::Error),

    #[error("cluster backend error: {0}")]
    Kube(#[from] kube::Error),

    #[error("internal driver error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;
