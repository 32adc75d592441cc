use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::envelope::{classify, Inbound};
use crate::error::ProtocolError;

/// Maximum size of one inbound line.
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Reads length-unbounded-but-capped, `\n`-terminated JSON lines from any
/// buffered async reader (stdin in production, an in-memory pipe in tests).
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(4096),
        }
    }

    /// Reads the next line. `Ok(None)` signals a clean EOF (the client
    /// closed stdin). A line longer than [`MAX_FRAME_BYTES`] is reported as
    /// an error without consuming the rest of the stream's framing — the
    /// caller should log and continue reading subsequent lines.
    pub async fn next_line(&mut self) -> Result<Option<String>, ProtocolError> {
        self.buf.clear();
        let n = self
            .inner
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| ProtocolError::InvalidRequest(e.to_string()))?;
        if n == 0 {
            return Ok(None);
        }
        if self.buf.len() > MAX_FRAME_BYTES {
            return Err(ProtocolError::FrameTooLarge {
                limit: MAX_FRAME_BYTES,
            });
        }
        while self.buf.last() == Some(&b'\n') || self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Reads and classifies the next frame in one step.
    pub async fn next_frame(&mut self) -> Result<Option<Inbound>, ProtocolError> {
        let Some(line) = self.next_line().await? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&line)?;
        classify(value).map(Some)
    }
}

/// Serializes outbound JSON-RPC messages under a mutex so concurrent
/// handler tasks never interleave partial lines on stdout.
pub struct FrameWriter<W> {
    inner: Mutex<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub async fn write_line(&self, value: &Value) -> Result<(), ProtocolError> {
        let mut line = serde_json::to_vec(value)?;
        line.push(b'\n');
        let mut guard = self.inner.lock().await;
        guard
            .write_all(&line)
            .await
            .map_err(|_| ProtocolError::WriterClosed)?;
        guard.flush().await.map_err(|_| ProtocolError::WriterClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_one_line_per_frame() {
        let data = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n{\"jsonrpc\":\"2.0\",\"method\":\"session/cancel\"}\n".to_vec();
        let mut reader = FrameReader::new(Cursor::new(data));

        let first = reader.next_frame().await.unwrap().unwrap();
        assert!(matches!(first, Inbound::Request { .. }));

        let second = reader.next_frame().await.unwrap().unwrap();
        assert!(matches!(second, Inbound::Notification { .. }));

        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_line_is_rejected() {
        let mut data = vec![b'"'; MAX_FRAME_BYTES + 10];
        data.push(b'\n');
        let mut reader = FrameReader::new(Cursor::new(data));
        let err = reader.next_line().await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn writer_serializes_concurrent_writes_without_interleaving() {
        let writer = std::sync::Arc::new(FrameWriter::new(tokio::io::sink()));
        let mut handles = Vec::new();
        for i in 0..20 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                writer
                    .write_line(&serde_json::json!({"jsonrpc":"2.0","id":i,"result":i}))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
