//! Backend abstraction for box lifecycle, exec, and archive transfer.
//!
//! One [`Driver`] implementation talks to a container engine, another to a
//! cluster API; callers above this crate never see the difference.

pub mod cluster;
pub mod container;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use error::{DriverError, Result};
pub use types::*;

/// Unified backend trait for box lifecycle, exec, and archive transfer.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn list(&self, filters: &[Filter]) -> Result<Vec<Box>>;
    async fn get(&self, id: &str) -> Result<Box>;
    async fn create(&self, req: CreateBoxRequest) -> Result<Box>;
    async fn start(&self, id: &str) -> Result<BoxStatus>;
    async fn stop(&self, id: &str) -> Result<BoxStatus>;
    async fn delete(&self, id: &str, force: bool) -> Result<()>;
    async fn delete_all(&self, force: bool) -> Result<(Vec<String>, usize)>;
    async fn exec(&self, id: &str, req: ExecSpec) -> Result<ExecAttach>;
    async fn inspect_exec(&self, handle: &ExecHandle) -> Result<i64>;
    async fn get_archive(&self, id: &str, path: &str) -> Result<(ArchiveReader, PathStat)>;
    async fn head_archive(&self, id: &str, path: &str) -> Result<PathStat>;
    async fn extract_archive(
        &self,
        id: &str,
        path: &str,
        tar: ArchiveReader,
        opts: ExtractOptions,
    ) -> Result<()>;
    async fn get_external_port(&self, id: &str, internal_port: u16) -> Result<u16>;
}
