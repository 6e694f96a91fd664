//! Shared application state handed to every axum handler.

use std::path::PathBuf;
use std::sync::Arc;

use gbox_browser::BrowserManager;
use gbox_core::labels::DEFAULT_PREFIX;
use gbox_service::{BoxService, Reclaimer};

#[derive(Clone)]
pub struct AppState {
    pub box_service: Arc<BoxService>,
    pub browser_manager: Arc<BrowserManager>,
    pub reclaimer: Arc<Reclaimer>,
    pub label_prefix: String,
    pub share_root: PathBuf,
}

impl AppState {
    pub fn new(
        box_service: Arc<BoxService>,
        browser_manager: Arc<BrowserManager>,
        reclaimer: Arc<Reclaimer>,
        label_prefix: impl Into<Option<String>>,
        share_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            box_service,
            browser_manager,
            reclaimer,
            label_prefix: label_prefix.into().unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            share_root: share_root.into(),
        }
    }
}
