//! High-resolution start/stop timing accumulated into running totals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quanta::Instant;

/// Timestamp captured by [`start_count`].
#[derive(Debug, Clone, Copy)]
#[must_use = "a start timestamp does nothing unless stopped"]
pub struct PerfStart(Instant);

/// Captures a monotonic high-resolution timestamp.
pub fn start_count() -> PerfStart {
    PerfStart(Instant::now())
}

impl PerfStart {
    pub fn elapsed(&self) -> Duration {
        Instant::now().duration_since(self.0)
    }

    /// Adds the time elapsed since `self` into `accumulator`.
    pub fn stop_and_accumulate(self, accumulator: &PerfAccumulator) -> Duration {
        let elapsed = self.elapsed();
        accumulator.add(elapsed);
        elapsed
    }
}

/// Running total of elapsed time for one phase.
///
/// Meant for a single writer. The total is atomic only so that another
/// thread can read it while a run is in progress.
#[derive(Debug, Default)]
pub struct PerfAccumulator {
    nanos: AtomicU64,
}

impl PerfAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn as_nanos(&self) -> u64 {
        self.nanos.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.as_nanos())
    }
}
