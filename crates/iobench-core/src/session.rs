//! Counters and cancellation shared between a driver call and its caller.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::perf::PerfAccumulator;

/// Live state of one benchmark session.
///
/// Drivers only ever increment the counters and read the cancellation
/// flag. The caller may read everything at any time and may set the
/// cancellation flag from another thread.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Requests that completed at submission time
    completed_sync: AtomicU64,

    /// Requests that completed later through the completion port
    completed_async: AtomicU64,

    /// Blocks moved and (when enabled) verified
    blocks_transferred: AtomicU64,

    /// Time spent inside read/write or submission calls
    read_write_time: PerfAccumulator,

    /// Time spent blocked waiting for completions
    completion_wait_time: PerfAccumulator,

    canceled: AtomicBool,

    /// Seed for the pseudorandom content source
    content_seed: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose random-content generator starts from `seed`.
    pub fn with_content_seed(seed: u64) -> Self {
        Self {
            content_seed: seed,
            ..Self::default()
        }
    }

    pub fn content_seed(&self) -> u64 {
        self.content_seed
    }

    /// Asks the running driver to stop issuing requests.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_sync_completion(&self) {
        self.completed_sync.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_async_completion(&self) {
        self.completed_async.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_blocks_transferred(&self, blocks: u64) {
        self.blocks_transferred.fetch_add(blocks, Ordering::Relaxed);
    }

    pub fn blocks_transferred(&self) -> u64 {
        self.blocks_transferred.load(Ordering::Relaxed)
    }

    pub fn read_write_time(&self) -> &PerfAccumulator {
        &self.read_write_time
    }

    pub fn completion_wait_time(&self) -> &PerfAccumulator {
        &self.completion_wait_time
    }

    /// Get current snapshot of the counters
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            completed_sync: self.completed_sync.load(Ordering::Relaxed),
            completed_async: self.completed_async.load(Ordering::Relaxed),
            blocks_transferred: self.blocks_transferred.load(Ordering::Relaxed),
            read_write_time: self.read_write_time.total(),
            completion_wait_time: self.completion_wait_time.total(),
            canceled: self.is_canceled(),
        }
    }
}

/// Point-in-time copy of [`SessionState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub completed_sync: u64,
    pub completed_async: u64,
    pub blocks_transferred: u64,
    pub read_write_time: Duration,
    pub completion_wait_time: Duration,
    pub canceled: bool,
}

impl SessionSnapshot {
    pub fn completed(&self) -> u64 {
        self.completed_sync + self.completed_async
    }
}

/// What a driver call accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub blocks_issued: u64,
    pub blocks_transferred: u64,
    /// The run stopped early because the session was canceled.
    pub canceled: bool,
}

impl RunOutcome {
    pub fn is_complete(&self, block_count: u64) -> bool {
        !self.canceled && self.blocks_transferred == block_count
    }
}
