//! Box service: request validation, tracker bookkeeping, and driver
//! delegation. Grounded on this codebase's CRI runtime service — one
//! struct holding the active driver, one method per operation, validate
//! then delegate then translate errors.

use std::sync::Arc;

use gbox_core::tracker::AccessTracker;
use gbox_driver::{Box, CreateBoxRequest, Driver, ExecAttach, ExecSpec, Filter};

use crate::error::{Result, ServiceError};

/// Default number of stdout/stderr lines `run()` keeps before truncating.
pub const DEFAULT_LINE_LIMIT: i64 = 100;

pub struct BoxService {
    driver: Arc<dyn Driver>,
    tracker: Arc<AccessTracker>,
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub cmd: Vec<String>,
    pub env: std::collections::BTreeMap<String, String>,
    pub working_dir: Option<String>,
    pub stdout_line_limit: i64,
    pub stderr_line_limit: i64,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl BoxService {
    pub fn new(driver: Arc<dyn Driver>, tracker: Arc<AccessTracker>) -> Self {
        Self { driver, tracker }
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }

    pub fn tracker(&self) -> Arc<AccessTracker> {
        self.tracker.clone()
    }

    pub async fn list(&self, filters: &[Filter]) -> Result<Vec<Box>> {
        Ok(self.driver.list(filters).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Box> {
        Ok(self.driver.get(id).await?)
    }

    pub async fn create(&self, req: CreateBoxRequest) -> Result<Box> {
        if req.image.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("image must not be empty".to_string()));
        }
        let created = self.driver.create(req).await?;
        self.tracker.update(&created.id);
        Ok(created)
    }

    pub async fn start(&self, id: &str) -> Result<()> {
        self.driver.start(id).await?;
        self.tracker.update(id);
        Ok(())
    }

    pub async fn stop(&self, id: &str) -> Result<()> {
        self.driver.stop(id).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str, force: bool) -> Result<()> {
        self.driver.delete(id, force).await?;
        self.tracker.remove(id);
        Ok(())
    }

    pub async fn delete_all(&self, force: bool) -> Result<(Vec<String>, usize)> {
        let result = self.driver.delete_all(force).await?;
        self.tracker.clear();
        Ok(result)
    }

    /// Streaming exec: hands back the live attach handle for the HTTP
    /// boundary to bridge onto a hijacked connection via `gbox-core`'s
    /// frame codec. Defaults to attaching all three streams when the
    /// caller didn't attach anything at all.
    pub async fn exec(&self, id: &str, mut req: ExecSpec) -> Result<ExecAttach> {
        if req.cmd.is_empty() {
            return Err(ServiceError::InvalidRequest("cmd must not be empty".to_string()));
        }
        if !req.attach_stdout && !req.attach_stderr && !req.attach_stdin {
            req.attach_stdout = true;
            req.attach_stderr = true;
        }
        self.tracker.update(id);
        Ok(self.driver.exec(id, req).await?)
    }

    pub async fn inspect_exec(&self, handle: &gbox_driver::ExecHandle) -> Result<i64> {
        Ok(self.driver.inspect_exec(handle).await?)
    }

    pub async fn get_archive(&self, id: &str, path: &str) -> Result<(gbox_driver::ArchiveReader, gbox_driver::PathStat)> {
        Ok(self.driver.get_archive(id, path).await?)
    }

    pub async fn head_archive(&self, id: &str, path: &str) -> Result<gbox_driver::PathStat> {
        Ok(self.driver.head_archive(id, path).await?)
    }

    pub async fn extract_archive(
        &self,
        id: &str,
        path: &str,
        tar: gbox_driver::ArchiveReader,
        opts: gbox_driver::ExtractOptions,
    ) -> Result<()> {
        Ok(self.driver.extract_archive(id, path, tar, opts).await?)
    }

    /// Non-streaming exec: collect the whole output, apply line
    /// truncation, and return it alongside the exit code.
    pub async fn run(&self, id: &str, req: RunRequest) -> Result<RunOutput> {
        if req.cmd.is_empty() {
            return Err(ServiceError::InvalidRequest("cmd must not be empty".to_string()));
        }
        self.tracker.update(id);

        let spec = ExecSpec {
            cmd: req.cmd,
            env: req.env,
            working_dir: req.working_dir,
            tty: false,
            attach_stdout: true,
            attach_stderr: true,
            attach_stdin: false,
        };

        let mut attach = self.driver.exec(id, spec).await?;
        let mut raw = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut attach.output, &mut raw)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut cursor = std::io::Cursor::new(raw);
        while let Ok(Some(frame)) = gbox_core::stream::read_frame(&mut cursor).await {
            let text = String::from_utf8_lossy(&frame.payload).into_owned();
            match frame.kind {
                gbox_core::stream::KIND_STDOUT => stdout.push_str(&text),
                gbox_core::stream::KIND_STDERR => stderr.push_str(&text),
                _ => {}
            }
        }

        let exit_code = self.driver.inspect_exec(&attach.handle).await?;

        Ok(RunOutput {
            exit_code,
            stdout: truncate_lines(&stdout, req.stdout_line_limit),
            stderr: truncate_lines(&stderr, req.stderr_line_limit),
        })
    }
}

fn truncate_lines(text: &str, limit: i64) -> String {
    if limit < 0 {
        return text.to_string();
    }
    text.lines()
        .take(limit as usize)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_lines_respects_limit() {
        let text = "a\nb\nc\nd";
        assert_eq!(truncate_lines(text, 2), "a\nb");
    }

    #[test]
    fn negative_limit_disables_truncation() {
        let text = "a\nb\nc";
        assert_eq!(truncate_lines(text, -1), text);
    }
}
