use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("box not running: {0}")]
    BoxNotRunning(String),

    #[error("could not connect to remote browser after {attempts} attempt(s): {last_error}")]
    ConnectFailed { attempts: u32, last_error: String },

    #[error("browser not found for box: {0}")]
    BrowserNotFound(String),

    #[error("context not found: {0}")]
    ContextNotFound(String),

    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("cdp error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrowserError>;

/// Substrings of `chromiumoxide` connection errors worth a retry rather
/// than an immediate failure.
pub const RETRYABLE_ERROR_SUBSTRINGS: &[&str] = &[
    "connection refused",
    "context deadline exceeded",
    "socket hang up",
    "websocket: bad handshake",
    "reset by peer",
    "network is unreachable",
];

pub fn is_retryable(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_ERROR_SUBSTRINGS
        .iter()
        .any(|needle| lower.contains(needle))
}
