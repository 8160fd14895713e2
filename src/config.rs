//! Configuration for the command channel and bulk transfers.
//!
//! All tunables live in explicit config structs passed at construction;
//! there is no module-level mutable state. The defaults match the timing
//! the instrument protocol was characterized with: 1 s for simple
//! commands, 5 s for block transfers, 100 ms pacing after fire-and-forget
//! commands, 250 000-point transfer windows.

use std::time::Duration;

/// Default timeout for simple command/response exchanges.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Default timeout for binary block transfers.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default pacing delay after a command with no response.
///
/// The instrument accepts the next command only after it has digested the
/// previous one; this delay is the margin for that processing latency.
pub const DEFAULT_COMMAND_PACING: Duration = Duration::from_millis(100);

/// Default maximum number of points served by one transfer sub-request.
pub const DEFAULT_MAX_BATCH: u64 = 250_000;

/// Default pacing delay between transfer windows.
pub const DEFAULT_WINDOW_PACING: Duration = Duration::from_millis(100);

/// Configuration for a [`CommandChannel`](crate::CommandChannel).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Timeout applied by `query`/`send` convenience methods.
    pub command_timeout: Duration,
    /// Timeout applied by block-transfer convenience methods.
    pub block_timeout: Duration,
    /// Delay inserted after commands that expect no response.
    pub command_pacing: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
            command_pacing: DEFAULT_COMMAND_PACING,
        }
    }
}

/// Configuration for a chunked bulk transfer.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Maximum points per sub-request window.
    pub max_batch: u64,
    /// Delay between consecutive windows.
    ///
    /// A reliability margin against instrument-side buffering limits,
    /// not a correctness requirement.
    pub window_pacing: Duration,
    /// Timeout for each window's block response.
    pub block_timeout: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            max_batch: DEFAULT_MAX_BATCH,
            window_pacing: DEFAULT_WINDOW_PACING,
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
        }
    }
}
