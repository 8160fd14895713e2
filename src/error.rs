//! Error types for scopewire.

use std::time::Duration;

use thiserror::Error;

/// Main error type for all scopewire operations.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Transport could not be established.
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Outbound write failed; the connection is presumed dead.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// No data of the required shape arrived within the deadline.
    ///
    /// The buffer is left untouched, so a caller may retry at a higher
    /// level without duplicate-reading part of a frame.
    #[error("timeout after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        /// What the consumer was blocked on (e.g. "12 bytes", "line").
        waiting_for: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// A block's marker, digit-count or length field is malformed.
    ///
    /// The stream position is unreliable after this error; the session
    /// should be aborted rather than resynchronized.
    #[error("framing error: {0}")]
    Framing(String),

    /// Response bytes could not be decoded as UTF-8 text.
    #[error("decode error: {0}")]
    Decode(#[from] std::str::Utf8Error),

    /// The reader task observed end-of-stream or a read error.
    ///
    /// Surfaced on the next blocking consume that cannot be satisfied
    /// from already-buffered bytes.
    #[error("connection closed")]
    ConnectionClosed,

    /// A response arrived intact but did not have the shape the driver
    /// expected (wrong field count, non-numeric value).
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ScopeError {
    /// Construct a `Timeout` for a consumer blocked on `waiting_for`.
    pub(crate) fn timeout(waiting_for: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            timeout,
        }
    }
}

/// Result type alias using ScopeError.
pub type Result<T> = std::result::Result<T, ScopeError>;
