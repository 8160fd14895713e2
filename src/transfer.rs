//! Chunked retrieval of bulk payloads that exceed the instrument's
//! per-request capacity.
//!
//! A transfer of `total` points is split into contiguous windows of at
//! most `max_batch` points. For each window the caller-supplied command
//! set is issued (two configuration commands establishing the bounds,
//! then the bulk-data query) and the block payloads are concatenated in
//! window order. The controller knows nothing about command semantics;
//! it only sequences them.

use tokio::time::sleep;

use crate::channel::CommandChannel;
use crate::config::TransferOptions;
use crate::error::Result;

/// One sub-request's absolute point range, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferWindow {
    /// First point of the window.
    pub start: u64,
    /// Last point of the window.
    pub stop: u64,
}

impl TransferWindow {
    /// Number of points covered by this window.
    pub fn points(&self) -> u64 {
        self.stop - self.start + 1
    }
}

/// The fully formed command text driving one window.
#[derive(Debug, Clone)]
pub struct WindowCommands {
    /// Configuration command establishing the window start (no response).
    pub set_start: String,
    /// Configuration command establishing the window stop (no response).
    pub set_stop: String,
    /// Bulk-data query answered with a binary block.
    pub fetch: String,
}

/// Split `total` points into ascending windows of at most `max_batch`.
///
/// Windows are contiguous, non-overlapping and cover `[1, total]`
/// exactly; `total == 0` yields no windows.
///
/// # Panics
///
/// Panics if `max_batch` is zero.
pub fn windows(total: u64, max_batch: u64) -> Vec<TransferWindow> {
    assert!(max_batch > 0, "max_batch must be nonzero");
    let mut plan = Vec::with_capacity(total.div_ceil(max_batch) as usize);
    let mut start = 1;
    while start <= total {
        let stop = u64::min(start + max_batch - 1, total);
        plan.push(TransferWindow { start, stop });
        start = stop + 1;
    }
    plan
}

/// Retrieve a bulk payload of `total` points window by window.
///
/// `commands_for` supplies the command text for each window. Windows are
/// issued in ascending order with `options.window_pacing` between them;
/// the returned accumulator holds the concatenated block payloads with
/// no gaps or overlaps. Any sub-request error aborts the whole transfer
/// with the underlying error; no partial result, no retry.
pub async fn fetch_chunked<F>(
    channel: &mut CommandChannel,
    total: u64,
    options: &TransferOptions,
    mut commands_for: F,
) -> Result<Vec<u8>>
where
    F: FnMut(&TransferWindow) -> WindowCommands,
{
    let plan = windows(total, options.max_batch);
    tracing::debug!(total, windows = plan.len(), "starting chunked transfer");

    let mut payload: Vec<u8> = Vec::new();
    for (index, window) in plan.iter().enumerate() {
        if index > 0 {
            sleep(options.window_pacing).await;
        }
        let commands = commands_for(window);
        channel.send(&commands.set_start).await?;
        channel.send(&commands.set_stop).await?;
        let block = channel
            .execute_block(&commands.fetch, options.block_timeout)
            .await?;
        tracing::debug!(
            window = index,
            start = window.start,
            stop = window.stop,
            bytes = block.len(),
            "window complete"
        );
        payload.extend_from_slice(&block);
    }
    Ok(payload)
}
