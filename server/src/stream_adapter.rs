//! Bridges a hijacked HTTP connection to a driver's exec attach streams.
//!
//! Grounded on this codebase's CRI streaming server
//! (`cri/src/streaming.rs`'s `handle_pty_stream`): two cooperative copy
//! loops running concurrently, each side closing independently and the
//! whole bridge tearing down once both finish. The old PTY-specific 5-byte
//! frame header doesn't appear here at all — the driver already picked raw
//! vs. `gbox-core` frame encoding for the exec→client direction based on
//! `ExecSpec::tty` before this bridge ever sees the streams, so the bridge
//! itself only moves bytes.

use std::sync::Arc;

use gbox_driver::{Driver, ExecAttach};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Copy bytes both ways between a hijacked socket and a live exec session
/// until both sides close, then inspect the exec for its exit code before
/// the attach and client connection are torn down: stdin-closed, then
/// stdout/stderr drained, then inspect, then close attach, then close the
/// client connection. Connection-closed sentinels are swallowed rather
/// than logged as failures.
pub async fn bridge<S>(socket: S, attach: ExecAttach, driver: Arc<dyn Driver>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut socket_read, mut socket_write) = tokio::io::split(socket);
    let ExecAttach { mut input, mut output, handle } = attach;

    let client_to_exec = async {
        let mut buf = [0u8; 8192];
        loop {
            match socket_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if input.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if !is_benign(&e) {
                        warn!(error = %e, "exec stream: client read failed");
                    }
                    break;
                }
            }
        }
        let _ = input.shutdown().await;
    };

    let exec_to_client = async {
        let mut buf = [0u8; 8192];
        loop {
            match output.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if socket_write.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    if !is_benign(&e) {
                        warn!(error = %e, "exec stream: backend read failed");
                    }
                    break;
                }
            }
        }
        let _ = socket_write.shutdown().await;
    };

    tokio::join!(client_to_exec, exec_to_client);

    match driver.inspect_exec(&handle).await {
        Ok(exit_code) => debug!(box_id = %handle.box_id, exit_code, "exec stream closed"),
        Err(e) => warn!(box_id = %handle.box_id, error = %e, "exec stream closed, inspect failed"),
    }
}

/// Connection-closed sentinels that must never be reported as an error:
/// EOF, broken pipe, connection reset.
fn is_benign(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_errors_are_recognized() {
        assert!(is_benign(&std::io::Error::from(std::io::ErrorKind::BrokenPipe)));
        assert!(is_benign(&std::io::Error::from(std::io::ErrorKind::UnexpectedEof)));
        assert!(!is_benign(&std::io::Error::from(std::io::ErrorKind::PermissionDenied)));
    }
}
