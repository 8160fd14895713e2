//! Shared byte buffer between the reader task and the command issuer.
//!
//! The reader task appends raw socket bytes at the tail; the command
//! issuer blocks on `consume`/`consume_line` until enough bytes are
//! buffered or a deadline elapses. One mutex guards the bytes and one
//! [`Notify`] wakes blocked consumers, so an append can always wake a
//! pending consume:
//!
//! ```text
//! reader task ──append──► StreamBuffer ──consume──► command issuer
//! ```
//!
//! Bytes are delivered in exact arrival order, never duplicated, and
//! removed only by consumption. A timed-out consume removes nothing, so
//! frame boundaries survive caller-level retries.

use std::sync::Mutex;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

use crate::error::{Result, ScopeError};

/// Initial capacity of the receive buffer.
const INITIAL_CAPACITY: usize = 4 * 1024;

struct BufferState {
    data: BytesMut,
    closed: bool,
}

/// Thread-safe growable buffer of undelivered bytes.
///
/// Append-only at the tail (reader task), consumed only from the head
/// (command issuer). Consumers must be serialized by the caller; the
/// command channel guarantees this by requiring `&mut self` for every
/// operation that consumes.
pub struct StreamBuffer {
    state: Mutex<BufferState>,
    notify: Notify,
}

impl StreamBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                data: BytesMut::with_capacity(INITIAL_CAPACITY),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append bytes at the tail and wake blocked consumers.
    ///
    /// Never fails and never blocks.
    pub fn append(&self, bytes: &[u8]) {
        {
            let mut state = self.state.lock().expect("buffer lock poisoned");
            state.data.extend_from_slice(bytes);
        }
        self.notify.notify_waiters();
    }

    /// Mark end-of-stream and wake blocked consumers.
    ///
    /// Bytes already buffered remain consumable; a consume that cannot be
    /// satisfied from them fails with [`ScopeError::ConnectionClosed`]
    /// instead of waiting out its timeout.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().expect("buffer lock poisoned");
            state.closed = true;
        }
        self.notify.notify_waiters();
    }

    /// Whether end-of-stream has been signalled.
    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("buffer lock poisoned").closed
    }

    /// Number of buffered, unconsumed bytes.
    pub fn len(&self) -> usize {
        self.state.lock().expect("buffer lock poisoned").data.len()
    }

    /// Check if no unconsumed bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return exactly the first `n` bytes.
    ///
    /// Blocks until `n` bytes are buffered or `timeout` elapses. On
    /// timeout the buffer is left untouched.
    pub async fn consume(&self, n: usize, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for wakeup before re-checking, so an append between
            // the check and the await cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().expect("buffer lock poisoned");
                if state.data.len() >= n {
                    return Ok(state.data.split_to(n).freeze());
                }
                if state.closed {
                    return Err(ScopeError::ConnectionClosed);
                }
            }

            if Instant::now() >= deadline {
                return Err(ScopeError::timeout(format!("{n} bytes"), timeout));
            }
            let _ = timeout_at(deadline, notified).await;
        }
    }

    /// Remove and return the bytes before the next `\n`.
    ///
    /// The delimiter itself is discarded; everything after it stays
    /// buffered verbatim. Blocks until a delimiter is buffered or
    /// `timeout` elapses; on timeout the buffer is left untouched.
    pub async fn consume_line(&self, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().expect("buffer lock poisoned");
                if let Some(pos) = state.data.iter().position(|&b| b == b'\n') {
                    let mut line = state.data.split_to(pos + 1);
                    line.truncate(pos);
                    return Ok(line.freeze());
                }
                if state.closed {
                    return Err(ScopeError::ConnectionClosed);
                }
            }

            if Instant::now() >= deadline {
                return Err(ScopeError::timeout("line", timeout));
            }
            let _ = timeout_at(deadline, notified).await;
        }
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const SHORT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_consume_exact_bytes() {
        let buffer = StreamBuffer::new();
        buffer.append(b"hello world");

        let head = buffer.consume(5, SHORT).await.unwrap();
        assert_eq!(&head[..], b"hello");
        assert_eq!(buffer.len(), 6);

        let rest = buffer.consume(6, SHORT).await.unwrap();
        assert_eq!(&rest[..], b" world");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_order_preserved_across_appends() {
        let buffer = StreamBuffer::new();

        // Arrival split one way, consumption split another.
        buffer.append(b"abc");
        buffer.append(b"de");
        buffer.append(b"fgh");

        let mut collected = Vec::new();
        for n in [1usize, 4, 3] {
            collected.extend_from_slice(&buffer.consume(n, SHORT).await.unwrap());
        }
        assert_eq!(collected, b"abcdefgh");
    }

    #[tokio::test]
    async fn test_byte_at_a_time_appends() {
        let buffer = StreamBuffer::new();
        for byte in b"RESP\n" {
            buffer.append(&[*byte]);
        }
        let line = buffer.consume_line(SHORT).await.unwrap();
        assert_eq!(&line[..], b"RESP");
    }

    #[tokio::test]
    async fn test_consume_line_leaves_remainder() {
        let buffer = StreamBuffer::new();
        buffer.append(b"RESP\n rest");

        let line = buffer.consume_line(SHORT).await.unwrap();
        assert_eq!(&line[..], b"RESP");

        // Leading space after the delimiter is preserved verbatim.
        let rest = buffer.consume(5, SHORT).await.unwrap();
        assert_eq!(&rest[..], b" rest");
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_timeout_leaves_buffer_untouched() {
        let buffer = StreamBuffer::new();
        buffer.append(b"abc");

        let started = Instant::now();
        let err = buffer.consume(5, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Timeout { .. }));
        assert!(started.elapsed() >= SHORT);

        // The three buffered bytes were not partially consumed.
        assert_eq!(buffer.len(), 3);
        let head = buffer.consume(3, SHORT).await.unwrap();
        assert_eq!(&head[..], b"abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_timeout_on_empty_buffer() {
        let buffer = StreamBuffer::new();

        let started = Instant::now();
        let err = buffer.consume(5, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Timeout { .. }));
        assert!(started.elapsed() >= SHORT);
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_line_timeout_on_unterminated_data() {
        let buffer = StreamBuffer::new();
        buffer.append(b"no newline here");

        let err = buffer.consume_line(SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::Timeout { .. }));
        assert_eq!(buffer.len(), 15);
    }

    #[tokio::test]
    async fn test_append_wakes_blocked_consumer() {
        let buffer = Arc::new(StreamBuffer::new());

        let consumer = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.consume(4, Duration::from_secs(5)).await })
        };

        tokio::task::yield_now().await;
        buffer.append(b"da");
        buffer.append(b"ta");

        let bytes = consumer.await.unwrap().unwrap();
        assert_eq!(&bytes[..], b"data");
    }

    #[tokio::test]
    async fn test_close_fails_unsatisfiable_consume_fast() {
        let buffer = Arc::new(StreamBuffer::new());

        let consumer = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.consume(1, Duration::from_secs(60)).await })
        };

        tokio::task::yield_now().await;
        buffer.close();

        let err = consumer.await.unwrap().unwrap_err();
        assert!(matches!(err, ScopeError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_buffered_bytes_survive_close() {
        let buffer = StreamBuffer::new();
        buffer.append(b"tail\n");
        buffer.close();

        let line = buffer.consume_line(SHORT).await.unwrap();
        assert_eq!(&line[..], b"tail");

        let err = buffer.consume(1, SHORT).await.unwrap_err();
        assert!(matches!(err, ScopeError::ConnectionClosed));
    }
}
