//! Managed browser/context/page tree.
//!
//! Three levels, each guarded by its own `tokio::sync::RwLock`, mirrored by
//! a flat `DashMap<page_id, ...>` for O(1) lookup during action dispatch.
//! Connecting to the remote CDP endpoint follows this codebase's bounded
//! health-check retry idiom: a fixed attempt count, a fixed delay between
//! attempts, and a per-attempt timeout, logging and retrying on anything
//! that looks transient.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use chromiumoxide::Handler;
use dashmap::DashMap;
use futures::StreamExt;
use gbox_driver::Driver;
use gbox_service::BoxService;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actions;
use crate::error::{is_retryable, BrowserError, Result};
use crate::types::{TabActivity, TabState};

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(4);
const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ManagedPage {
    pub id: String,
    pub context_id: String,
    pub page: Page,
}

pub struct ManagedContext {
    pub id: String,
    pub box_id: String,
    pub pages: RwLock<HashMap<String, Arc<ManagedPage>>>,
}

pub struct ManagedBrowser {
    pub box_id: String,
    pub browser: Browser,
    pub contexts: RwLock<HashMap<String, Arc<ManagedContext>>>,
    /// Flipped to `false` by the disconnect watcher once the CDP
    /// connection's event loop ends, so a cached handle can be recognized
    /// as dead even if the cascade removal hasn't run yet.
    connected: AtomicBool,
}

#[derive(Default)]
pub struct BrowserTree {
    browsers: RwLock<HashMap<String, Arc<ManagedBrowser>>>,
    /// Flat index from page id straight to its owning context/browser ids,
    /// so action dispatch doesn't have to walk the whole tree.
    page_index: DashMap<String, (String, String, String)>,
}

impl BrowserTree {
    /// Remove a browser and cascade through its contexts/pages, clearing
    /// every page entry from the flat index. Shared by an explicit
    /// `close_browser` call and by the disconnect watcher, since a crashed
    /// or closed browser must leave the tree in the same state either way.
    async fn remove_browser(&self, box_id: &str) -> Option<Arc<ManagedBrowser>> {
        let removed = self.browsers.write().await.remove(box_id);
        if let Some(managed) = &removed {
            let contexts = managed.contexts.read().await;
            for context in contexts.values() {
                let pages = context.pages.read().await;
                for page_id in pages.keys() {
                    self.page_index.remove(page_id);
                }
            }
        }
        removed
    }
}

pub struct BrowserManager {
    tree: Arc<BrowserTree>,
    box_service: Arc<BoxService>,
    internal_port: u16,
    share_root: PathBuf,
}

impl BrowserManager {
    pub fn new(box_service: Arc<BoxService>, internal_port: u16, share_root: impl Into<PathBuf>) -> Self {
        Self {
            tree: Arc::new(BrowserTree::default()),
            box_service,
            internal_port,
            share_root: share_root.into(),
        }
    }

    /// Return the managed browser for `box_id`, connecting lazily and
    /// caching the connection for reuse. A cached entry left behind by a
    /// disconnect the watcher hasn't cleaned up yet is evicted and
    /// reconnected rather than handed back dead.
    pub async fn get_or_create_managed_browser(&self, box_id: &str) -> Result<Arc<ManagedBrowser>> {
        if let Some(existing) = self.tree.browsers.read().await.get(box_id) {
            if existing.connected.load(Ordering::Acquire) {
                return Ok(existing.clone());
            }
        }

        let mut browsers = self.tree.browsers.write().await;
        if let Some(existing) = browsers.get(box_id) {
            if existing.connected.load(Ordering::Acquire) {
                return Ok(existing.clone());
            }
            browsers.remove(box_id);
        }

        let b = self
            .box_service
            .get(box_id)
            .await
            .map_err(|_| BrowserError::BoxNotRunning(box_id.to_string()))?;
        if b.status != gbox_driver::BoxStatus::Running {
            return Err(BrowserError::BoxNotRunning(box_id.to_string()));
        }

        let host_port = self
            .box_service
            .driver()
            .get_external_port(box_id, self.internal_port)
            .await
            .map_err(|e| BrowserError::ConnectFailed {
                attempts: 0,
                last_error: e.to_string(),
            })?;

        let (browser, handler) = connect_with_retry(host_port).await?;
        let managed = Arc::new(ManagedBrowser {
            box_id: box_id.to_string(),
            browser,
            contexts: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
        });
        browsers.insert(box_id.to_string(), managed.clone());

        let watch_managed = managed.clone();
        let watch_tree = self.tree.clone();
        let watch_box_id = box_id.to_string();
        tokio::spawn(async move {
            watch_handler(handler).await;
            watch_managed.connected.store(false, Ordering::Release);
            warn!(box_id = %watch_box_id, "browser connection closed, evicting from managed tree");
            watch_tree.remove_browser(&watch_box_id).await;
        });

        Ok(managed)
    }

    pub async fn create_context(&self, box_id: &str) -> Result<Arc<ManagedContext>> {
        let browser = self.get_or_create_managed_browser(box_id).await?;
        let id = Uuid::new_v4().to_string();
        let context = Arc::new(ManagedContext {
            id: id.clone(),
            box_id: box_id.to_string(),
            pages: RwLock::new(HashMap::new()),
        });
        browser.contexts.write().await.insert(id, context.clone());
        Ok(context)
    }

    pub async fn create_page(
        &self,
        box_id: &str,
        context_id: &str,
        url: &str,
    ) -> Result<Arc<ManagedPage>> {
        let browser = self.get_or_create_managed_browser(box_id).await?;
        let contexts = browser.contexts.read().await;
        let context = contexts
            .get(context_id)
            .ok_or_else(|| BrowserError::ContextNotFound(context_id.to_string()))?
            .clone();
        drop(contexts);

        let page = browser
            .browser
            .new_page(CreateTargetParams::new(url))
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let managed = Arc::new(ManagedPage {
            id: id.clone(),
            context_id: context_id.to_string(),
            page,
        });
        context.pages.write().await.insert(id.clone(), managed.clone());
        self.tree
            .page_index
            .insert(id, (box_id.to_string(), context_id.to_string(), managed.id.clone()));
        Ok(managed)
    }

    pub async fn close_page(&self, box_id: &str, context_id: &str, page_id: &str) -> Result<()> {
        let browser = self.get_or_create_managed_browser(box_id).await?;
        let contexts = browser.contexts.read().await;
        let context = contexts
            .get(context_id)
            .ok_or_else(|| BrowserError::ContextNotFound(context_id.to_string()))?
            .clone();
        drop(contexts);

        let removed = context.pages.write().await.remove(page_id);
        self.tree.page_index.remove(page_id);
        if let Some(managed) = removed {
            if let Err(e) = managed.page.close().await {
                warn!(page_id, error = %e, "failed to close page cleanly");
            }
        }
        Ok(())
    }

    pub async fn close_context(&self, box_id: &str, context_id: &str) -> Result<()> {
        let browser = self.get_or_create_managed_browser(box_id).await?;
        let removed = browser.contexts.write().await.remove(context_id);
        if let Some(context) = removed {
            let pages = context.pages.write().await;
            for (page_id, managed) in pages.iter() {
                self.tree.page_index.remove(page_id);
                if let Err(e) = managed.page.close().await {
                    warn!(page_id, error = %e, "failed to close page during context close");
                }
            }
        }
        Ok(())
    }

    pub async fn close_browser(&self, box_id: &str) -> Result<()> {
        let removed = self.tree.remove_browser(box_id).await;
        if let Some(managed) = removed {
            let mut browser = managed.browser.clone();
            if let Err(e) = browser.close().await {
                warn!(box_id, error = %e, "failed to close browser cleanly");
            }
        }
        Ok(())
    }

    /// Snapshot every open page in a context as tab state, skipping any
    /// page that's already gone.
    pub async fn tab_states(&self, box_id: &str, context_id: &str) -> Result<Vec<TabState>> {
        let browser = self.get_or_create_managed_browser(box_id).await?;
        let contexts = browser.contexts.read().await;
        let context = contexts
            .get(context_id)
            .ok_or_else(|| BrowserError::ContextNotFound(context_id.to_string()))?;

        let pages = context.pages.read().await;
        let mut states = Vec::new();
        for managed in pages.values() {
            let url = managed.page.url().await.ok().flatten().unwrap_or_default();
            let title = managed.page.get_title().await.ok().flatten().unwrap_or_default();
            states.push(TabState {
                title,
                url,
                favicon: None,
                state: TabActivity { loading: false, active: true },
            });
        }
        Ok(states)
    }

    /// Resolve the page and dispatch a `vision.*`/`snapshot.*` action
    /// against it, then fold the current tab state into the response so
    /// callers never have to make a second round trip.
    pub async fn dispatch_action(
        &self,
        box_id: &str,
        context_id: &str,
        page_id: &str,
        action_type: &str,
        params: &serde_json::Value,
    ) -> crate::types::ActionResponse {
        let result = self.resolve_page(box_id, context_id, page_id).await;
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                return crate::types::ActionResponse {
                    success: false,
                    message: Some(e.to_string()),
                    tab_state: None,
                };
            }
        };

        let outcome = actions::dispatch(&page.page, action_type, params, &self.share_root, box_id).await;
        let tab_state = self.tab_states(box_id, context_id).await.ok();

        match outcome {
            Ok(_) => crate::types::ActionResponse {
                success: true,
                message: None,
                tab_state,
            },
            Err(e) => crate::types::ActionResponse {
                success: false,
                message: Some(e.to_string()),
                tab_state,
            },
        }
    }

    pub(crate) async fn resolve_page(&self, box_id: &str, context_id: &str, page_id: &str) -> Result<Arc<ManagedPage>> {
        let browser = self.get_or_create_managed_browser(box_id).await?;
        let contexts = browser.contexts.read().await;
        let context = contexts
            .get(context_id)
            .ok_or_else(|| BrowserError::ContextNotFound(context_id.to_string()))?
            .clone();
        drop(contexts);

        let pages = context.pages.read().await;
        pages
            .get(page_id)
            .cloned()
            .ok_or_else(|| BrowserError::PageNotFound(page_id.to_string()))
    }
}

/// Connect to a box's exposed CDP endpoint, retrying transient failures a
/// bounded number of times. The caller owns draining the returned handler
/// so it can react once the event loop ends (the connection closed).
async fn connect_with_retry(host_port: u16) -> Result<(Browser, Handler)> {
    let endpoint = format!("http://127.0.0.1:{host_port}");
    let config = BrowserConfig::builder()
        .build()
        .map_err(|e| BrowserError::ConnectFailed { attempts: 0, last_error: e })?;
    let _ = config;

    let mut last_error = String::new();
    for attempt in 1..=CONNECT_ATTEMPTS {
        let attempt_result = tokio::time::timeout(
            CONNECT_ATTEMPT_TIMEOUT,
            Browser::connect(&endpoint),
        )
        .await;

        match attempt_result {
            Ok(Ok((browser, handler))) => {
                info!(endpoint, attempt, "connected to remote browser");
                return Ok((browser, handler));
            }
            Ok(Err(e)) => {
                last_error = e.to_string();
                if !is_retryable(&last_error) {
                    return Err(BrowserError::ConnectFailed { attempts: attempt, last_error });
                }
            }
            Err(_) => {
                last_error = "connection attempt timed out".to_string();
            }
        }

        warn!(endpoint, attempt, error = %last_error, "browser connect attempt failed, retrying");
        if attempt < CONNECT_ATTEMPTS {
            tokio::time::sleep(CONNECT_RETRY_DELAY).await;
        }
    }

    Err(BrowserError::ConnectFailed { attempts: CONNECT_ATTEMPTS, last_error })
}

/// Drain the CDP event handler until the connection closes — mirrors the
/// bounded health-check idiom's "keep going until the loop naturally ends"
/// shape, just with no retry since a handler doesn't reconnect itself.
async fn watch_handler(mut handler: Handler) {
    while handler.next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_substrings_are_case_insensitive() {
        assert!(is_retryable("Connection Refused"));
        assert!(is_retryable("WEBSOCKET: BAD HANDSHAKE"));
        assert!(!is_retryable("permission denied"));
    }
}
