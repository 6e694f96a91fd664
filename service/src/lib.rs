//! Orchestration layer: validates requests, keeps the access tracker in
//! sync with driver calls, and runs the periodic reclaimer.

pub mod error;
pub mod reclaimer;
pub mod service;

pub use error::{Result, ServiceError};
pub use reclaimer::{ReclaimReport, Reclaimer};
pub use service::{BoxService, RunOutput, RunRequest};
