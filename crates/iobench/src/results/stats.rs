//! Statistics derived from a session snapshot.

// Byte and block counts convert to f64 for rates; precision loss is irrelevant at these scales.
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::time::Duration;

use iobench_core::SessionSnapshot;

use crate::config::RunConfig;

/// Computed statistics for one run, or for a run still in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    /// Blocks moved (and verified, when enabled).
    pub blocks_transferred: u64,
    /// Bytes moved so far.
    pub bytes_transferred: u64,
    /// Bytes a complete run moves.
    pub bytes_total: u64,
    /// Completed fraction, 0.0-1.0.
    pub fraction_complete: f64,
    /// Requests that completed at submission.
    pub completed_sync: u64,
    /// Requests that completed through the completion port.
    pub completed_async: u64,
    /// Total time inside read/write or submission calls.
    pub read_write_time: Duration,
    /// Total time blocked waiting for completions.
    pub completion_wait_time: Duration,
    /// Mean time per read/write or submission call.
    pub mean_call_time: Duration,
    /// Time the transfer has been running.
    pub transfer_time: Duration,
    /// Average rates over the transfer time.
    pub throughput: Throughput,
}

/// Throughput metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Throughput {
    /// Bytes per second.
    pub bytes_per_sec: f64,
    /// Blocks per second.
    pub ops_per_sec: f64,
}

impl Throughput {
    /// Rates for `bytes` and `ops` moved in `elapsed`. Zero when no time has passed.
    pub fn over(bytes: u64, ops: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return Self::default();
        }
        Self {
            bytes_per_sec: bytes as f64 / secs,
            ops_per_sec: ops as f64 / secs,
        }
    }
}

/// Compute statistics from `snapshot`, averaging over `transfer_time`.
///
/// File creation and preallocation are excluded from the averages; pass the
/// transfer time, not the wall time.
pub fn compute_stats(
    snapshot: &SessionSnapshot,
    config: &RunConfig,
    transfer_time: Duration,
) -> RunStats {
    let block_size = config.block_size as u64;
    let blocks = snapshot.blocks_transferred;
    let bytes_transferred = blocks.saturating_mul(block_size);

    let fraction_complete = if config.block_count == 0 {
        1.0
    } else {
        blocks as f64 / config.block_count as f64
    };

    let calls = snapshot.completed();
    let mean_call_time = if calls == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos((snapshot.read_write_time.as_nanos() / u128::from(calls)) as u64)
    };

    RunStats {
        blocks_transferred: blocks,
        bytes_transferred,
        bytes_total: config.total_bytes(),
        fraction_complete,
        completed_sync: snapshot.completed_sync,
        completed_async: snapshot.completed_async,
        read_write_time: snapshot.read_write_time,
        completion_wait_time: snapshot.completion_wait_time,
        mean_call_time,
        transfer_time,
        throughput: Throughput::over(bytes_transferred, blocks, transfer_time),
    }
}

impl RunStats {
    /// Average goodput in binary megabytes per second.
    pub fn mib_per_sec(&self) -> f64 {
        self.throughput.bytes_per_sec / (1024.0 * 1024.0)
    }

    /// Average goodput in decimal megabits per second.
    pub fn mbit_per_sec(&self) -> f64 {
        self.throughput.bytes_per_sec * 8.0 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(blocks: u64, block_size: usize) -> RunConfig {
        let mut config = RunConfig::new("bench.dat");
        config.block_count = blocks;
        config.block_size = block_size;
        config
    }

    #[test]
    fn test_stats_midway() {
        let snapshot = SessionSnapshot {
            completed_sync: 10,
            completed_async: 30,
            blocks_transferred: 32,
            read_write_time: Duration::from_millis(80),
            completion_wait_time: Duration::from_millis(900),
            canceled: false,
        };
        let stats = compute_stats(&snapshot, &config(128, 1 << 20), Duration::from_secs(2));

        assert_eq!(stats.bytes_transferred, 32 << 20);
        assert_eq!(stats.bytes_total, 128 << 20);
        assert!((stats.fraction_complete - 0.25).abs() < 1e-12);
        assert_eq!(stats.mean_call_time, Duration::from_millis(2));
        assert!((stats.mib_per_sec() - 16.0).abs() < 1e-9);
        assert!((stats.throughput.ops_per_sec - 16.0).abs() < 1e-9);
        assert!((stats.mbit_per_sec() - 134.217_728).abs() < 1e-6);
        assert_eq!(stats.completion_wait_time, Duration::from_millis(900));
    }

    #[test]
    fn test_stats_before_any_progress() {
        let stats = compute_stats(&SessionSnapshot::default(), &config(16, 4096), Duration::ZERO);
        assert_eq!(stats.bytes_transferred, 0);
        assert_eq!(stats.mean_call_time, Duration::ZERO);
        assert_eq!(stats.throughput, Throughput::default());
        assert!(stats.fraction_complete.abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_block_run_is_complete() {
        let stats = compute_stats(&SessionSnapshot::default(), &config(0, 4096), Duration::ZERO);
        assert!((stats.fraction_complete - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.bytes_total, 0);
    }

    #[test]
    fn test_oversized_run_saturates() {
        let config = config(u64::MAX, 1 << 20);
        let stats = compute_stats(&SessionSnapshot::default(), &config, Duration::from_secs(1));
        assert_eq!(stats.bytes_total, u64::MAX);
        assert!(stats.fraction_complete.abs() < f64::EPSILON);
    }
}
