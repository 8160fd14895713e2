//! TCP transport to the instrument.
//!
//! Owns the duplex socket, split into halves: the read half is handed to
//! a single background task that pumps arriving bytes into the shared
//! [`StreamBuffer`]; the write half stays with the transport for
//! synchronous outbound writes.
//!
//! Disconnection is not reported proactively. The reader task closes the
//! buffer on end-of-stream or a read error and exits; callers observe
//! this as [`ScopeError::ConnectionClosed`] on their next blocking
//! consume, or as a `Write` error on their next command.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use crate::error::{Result, ScopeError};
use crate::protocol::StreamBuffer;

/// Port the instrument's SCPI socket service listens on.
pub const DEFAULT_PORT: u16 = 5555;

/// Size of the reader task's per-read scratch buffer.
const READ_CHUNK: usize = 4096;

/// A connected instrument socket with its background reader task.
pub struct TcpTransport {
    writer: OwnedWriteHalf,
    buffer: Arc<StreamBuffer>,
    reader_task: JoinHandle<()>,
    closed: bool,
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl TcpTransport {
    /// Establish the stream and start the reader task.
    ///
    /// `addr` is `host` or `host:port`; a bare host uses [`DEFAULT_PORT`].
    pub async fn connect(addr: &str) -> Result<Self> {
        let addr = with_default_port(addr);
        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(ScopeError::Connect)?;
        tracing::debug!(%addr, "connected");

        let (read_half, writer) = stream.into_split();
        let buffer = Arc::new(StreamBuffer::new());
        let reader_task = tokio::spawn(read_loop(read_half, buffer.clone()));

        Ok(Self {
            writer,
            buffer,
            reader_task,
            closed: false,
        })
    }

    /// Handle to the shared receive buffer, for the frame decoders.
    pub fn buffer(&self) -> &Arc<StreamBuffer> {
        &self.buffer
    }

    /// Send bytes verbatim on the stream.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(ScopeError::Write)?;
        self.writer.flush().await.map_err(ScopeError::Write)
    }

    /// Shut down both directions and stop the reader task.
    ///
    /// Idempotent; after close no further write or reader activity
    /// occurs.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.writer.shutdown().await;
        self.reader_task.abort();
        self.buffer.close();
        tracing::debug!("transport closed");
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

/// Pump socket bytes into the buffer until end-of-stream or error.
async fn read_loop(mut reader: OwnedReadHalf, buffer: Arc<StreamBuffer>) {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                tracing::debug!("peer closed the connection");
                break;
            }
            Ok(n) => buffer.append(&chunk[..n]),
            Err(e) => {
                tracing::debug!("read error, stopping reader: {e}");
                break;
            }
        }
    }
    buffer.close();
}

fn with_default_port(addr: &str) -> String {
    if addr.contains(':') {
        addr.to_owned()
    } else {
        format!("{addr}:{DEFAULT_PORT}")
    }
}
