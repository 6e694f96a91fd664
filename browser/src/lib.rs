//! Managed browser/context/page tree for the headless-browser subsystem.
//!
//! A [`BrowserManager`] lazily connects to each box's remote CDP endpoint,
//! keeps a three-level tree of browser/context/page state, and dispatches
//! vision actions (click, type, scroll, screenshot, ...) against a
//! resolved page.

pub mod actions;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{BrowserError, Result};
pub use manager::{BrowserManager, ManagedBrowser, ManagedContext, ManagedPage};
pub use types::{ActionRequest, ActionResponse, ScreenshotOptions, TabActivity, TabState};
