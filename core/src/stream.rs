//! Multiplexed stdin/stdout/stderr framing for exec streams.
//!
//! Wire format: `[kind: u8] [reserved: 3 bytes, zero] [length: u32 BE] [payload]`.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame payload size: 64 KiB.
pub const MAX_FRAME_PAYLOAD: usize = 64 * 1024;

/// Frame carries data written to the exec's stdin.
pub const KIND_STDIN: u8 = 0;
/// Frame carries data read from the exec's stdout.
pub const KIND_STDOUT: u8 = 1;
/// Frame carries data read from the exec's stderr.
pub const KIND_STDERR: u8 = 2;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame payload too large: {0} bytes (max {MAX_FRAME_PAYLOAD})")]
    TooLarge(usize),
    #[error("unknown stream kind: 0x{0:02x}")]
    UnknownKind(u8),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded multiplexed stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn stdin(payload: Vec<u8>) -> Self {
        Self { kind: KIND_STDIN, payload }
    }

    pub fn stdout(payload: Vec<u8>) -> Self {
        Self { kind: KIND_STDOUT, payload }
    }

    pub fn stderr(payload: Vec<u8>) -> Self {
        Self { kind: KIND_STDERR, payload }
    }
}

/// Write one frame to an async writer.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    w: &mut W,
    kind: u8,
    payload: &[u8],
) -> Result<(), FrameError> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::TooLarge(payload.len()));
    }
    let mut header = [0u8; 8];
    header[0] = kind;
    header[4..8].copy_from_slice(&(payload.len() as u32).to_be_bytes());
    w.write_all(&header).await?;
    w.write_all(payload).await?;
    w.flush().await?;
    Ok(())
}

/// Read one frame from an async reader. Returns `Ok(None)` on clean EOF.
pub async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> Result<Option<Frame>, FrameError> {
    let mut header = [0u8; 8];
    match r.read_exact(&mut header).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let kind = header[0];
    if !matches!(kind, KIND_STDIN | KIND_STDOUT | KIND_STDERR) {
        return Err(FrameError::UnknownKind(kind));
    }
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len > MAX_FRAME_PAYLOAD {
        return Err(FrameError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    if len > 0 {
        r.read_exact(&mut payload).await?;
    }
    Ok(Some(Frame { kind, payload }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_stdout() {
        let mut buf = Vec::new();
        write_frame(&mut buf, KIND_STDOUT, b"hello").await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert_eq!(frame.kind, KIND_STDOUT);
        assert_eq!(frame.payload, b"hello");
    }

    #[tokio::test]
    async fn roundtrip_all_kinds() {
        for kind in [KIND_STDIN, KIND_STDOUT, KIND_STDERR] {
            let mut buf = Vec::new();
            write_frame(&mut buf, kind, b"x").await.unwrap();
            let mut cursor = std::io::Cursor::new(buf);
            let frame = read_frame(&mut cursor).await.unwrap().unwrap();
            assert_eq!(frame.kind, kind);
        }
    }

    #[tokio::test]
    async fn empty_payload_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, KIND_STDERR, b"").await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap().unwrap();
        assert!(frame.payload.is_empty());
    }

    #[tokio::test]
    async fn eof_returns_none() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_payload_rejected_on_write() {
        let mut buf = Vec::new();
        let huge = vec![0u8; MAX_FRAME_PAYLOAD + 1];
        let err = write_frame(&mut buf, KIND_STDOUT, &huge).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(_)));
    }

    #[tokio::test]
    async fn oversized_length_rejected_on_read() {
        let mut buf = Vec::new();
        buf.push(KIND_STDOUT);
        buf.extend_from_slice(&[0, 0, 0]);
        let huge_len = (MAX_FRAME_PAYLOAD as u32) + 1;
        buf.extend_from_slice(&huge_len.to_be_bytes());

        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(_)));
    }

    #[tokio::test]
    async fn unknown_kind_rejected() {
        let mut buf = vec![0xFFu8, 0, 0, 0, 0, 0, 0, 0];
        let mut cursor = std::io::Cursor::new(std::mem::take(&mut buf));
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind(0xFF)));
    }
}
