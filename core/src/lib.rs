//! Shared types for the gbox control plane: configuration, the error
//! taxonomy, the access tracker, label conventions, and the multiplexed
//! stream frame codec used by the exec/attach path.

pub mod config;
pub mod error;
pub mod labels;
pub mod stream;
pub mod tracker;

pub use config::{ClusterMode, Config};
pub use error::{CoreError, Result};
pub use labels::ManagedLabels;
pub use tracker::AccessTracker;

/// gbox version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
