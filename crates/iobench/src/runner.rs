//! Runs one configured benchmark end to end.
//!
//! Opening the target, preallocation, and the transfer are timed separately.
//! The driver runs on a scoped worker thread while the calling thread keeps
//! the progress display current.

use std::fs::File;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use iobench_core::prep;
use iobench_core::{RunOutcome, SessionSnapshot, SessionState, run_asynchronous, run_synchronous};
use quanta::Instant;
use tracing::{debug, info};

use crate::config::{Preallocation, RunConfig};
use crate::progress::{LiveProgress, REFRESH_INTERVAL};

/// Time spent in each stage of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTimings {
    /// Opening (and creating) the target.
    pub create_file: Duration,
    /// Sizing the target before a write.
    pub preallocation: Duration,
    /// The driver call, plus the final flush of a write.
    pub transfer: Duration,
    /// Everything above, end to end.
    pub wall: Duration,
}

/// What one run did.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub snapshot: SessionSnapshot,
    pub timings: RunTimings,
}

impl RunReport {
    pub fn canceled(&self) -> bool {
        self.outcome.canceled
    }
}

/// Runs `config`, reporting progress through `progress`.
///
/// `session` may be canceled from another thread; the run then drains and
/// returns a report marked canceled.
pub fn run(
    config: &RunConfig,
    session: &SessionState,
    progress: &LiveProgress,
) -> Result<RunReport> {
    let wall = Instant::now();

    let start = Instant::now();
    let file = prep::open_target(&config.path, &config.target_options())
        .with_context(|| format!("Failed to open {}", config.path.display()))?;
    let create_file = start.elapsed();
    debug!(?create_file, path = %config.path.display(), "target opened");

    if config.disable_local_buffering {
        prep::disable_local_buffering(&file).context("Failed to disable local buffering")?;
    }
    if config.enable_prefetch {
        prep::hint_prefetch(&file).context("Failed to enable prefetch")?;
    }

    let preallocation = preallocate(&file, config)?;

    let (outcome, transfer) = transfer(&file, config, session, progress)?;

    let timings = RunTimings {
        create_file,
        preallocation,
        transfer,
        wall: wall.elapsed(),
    };
    info!(
        blocks = outcome.blocks_transferred,
        canceled = outcome.canceled,
        transfer_ms = transfer.as_millis(),
        "run finished"
    );

    Ok(RunReport {
        outcome,
        snapshot: session.snapshot(),
        timings,
    })
}

fn preallocate(file: &File, config: &RunConfig) -> Result<Duration> {
    if !config.operation.is_write() || !config.preallocation.is_enabled() {
        return Ok(Duration::ZERO);
    }

    let size = config.total_bytes();
    let start = Instant::now();
    match config.preallocation {
        Preallocation::Zeroed => prep::prepare_capacity(file, size),
        Preallocation::LengthOnly => prep::set_file_size(file, size),
        Preallocation::None => Ok(()),
    }
    .with_context(|| format!("Failed to preallocate {size} bytes"))?;

    let elapsed = start.elapsed();
    debug!(size, ?elapsed, "preallocated");
    Ok(elapsed)
}

fn transfer(
    file: &File,
    config: &RunConfig,
    session: &SessionState,
    progress: &LiveProgress,
) -> Result<(RunOutcome, Duration)> {
    let display = thread::current();
    let shown = Instant::now();

    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("iobench-driver".to_string())
            .spawn_scoped(scope, || {
                let start = Instant::now();
                let result = drive(file, config, session);
                let elapsed = start.elapsed();
                display.unpark();
                result.map(|outcome| (outcome, elapsed))
            })
            .context("Failed to spawn driver thread")?;

        while !worker.is_finished() {
            progress.update(&session.snapshot(), shown.elapsed());
            thread::park_timeout(REFRESH_INTERVAL);
        }
        progress.update(&session.snapshot(), shown.elapsed());

        worker
            .join()
            .map_err(|_| anyhow!("driver thread panicked"))?
    })
}

fn drive(file: &File, config: &RunConfig, session: &SessionState) -> Result<RunOutcome> {
    let outcome = if config.asynchronous {
        drive_async(file, config, session)?
    } else {
        let mut handle = file;
        run_synchronous(&mut handle, &config.workload(), session)?
    };

    if config.operation.is_write() && !config.no_flush {
        file.sync_data().context("Failed to flush written data")?;
    }
    Ok(outcome)
}

#[cfg(all(target_os = "linux", feature = "io-uring"))]
fn drive_async(file: &File, config: &RunConfig, session: &SessionState) -> Result<RunOutcome> {
    let workload = config.workload();
    if config.io_uring {
        return Ok(iobench_core::run_asynchronous_uring(file, &workload, session)?);
    }
    Ok(run_asynchronous(file, &workload, session)?)
}

#[cfg(not(all(target_os = "linux", feature = "io-uring")))]
fn drive_async(file: &File, config: &RunConfig, session: &SessionState) -> Result<RunOutcome> {
    Ok(run_asynchronous(file, &config.workload(), session)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iobench_core::{AccessPattern, BenchError, Operation, codec};

    fn config(dir: &tempfile::TempDir, operation: Operation) -> RunConfig {
        let mut config = RunConfig::new(dir.path().join("bench.dat"));
        config.operation = operation;
        config.block_count = 16;
        config.block_size = 4096;
        config
    }

    fn run_hidden(config: &RunConfig, session: &SessionState) -> Result<RunReport> {
        run(config, session, &LiveProgress::hidden(config))
    }

    #[test]
    fn sync_write_then_verified_read() {
        let dir = tempfile::tempdir().unwrap();

        let write = config(&dir, Operation::Write);
        let report = run_hidden(&write, &SessionState::new()).unwrap();
        assert!(!report.canceled());
        assert_eq!(report.snapshot.blocks_transferred, 16);
        assert_eq!(report.snapshot.completed_sync, 16);
        assert!(report.timings.wall >= report.timings.transfer);

        let mut read = config(&dir, Operation::Read);
        read.verify = true;
        let report = run_hidden(&read, &SessionState::new()).unwrap();
        assert!(report.outcome.is_complete(16));
    }

    #[test]
    fn async_random_write_with_zeroed_preallocation() {
        let dir = tempfile::tempdir().unwrap();
        let mut write = config(&dir, Operation::Write);
        write.pattern = AccessPattern::Random;
        write.asynchronous = true;
        write.max_outstanding = 4;
        write.preallocation = Preallocation::Zeroed;

        let report = run_hidden(&write, &SessionState::new()).unwrap();
        assert_eq!(report.snapshot.completed(), 16);
        assert_eq!(report.outcome.blocks_transferred, 16);

        let contents = std::fs::read(&write.path).unwrap();
        assert_eq!(contents.len(), 16 * 4096);
        codec::verify(&contents, 0).unwrap();
    }

    #[test]
    fn length_only_preallocation_sizes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut write = config(&dir, Operation::Write);
        write.preallocation = Preallocation::LengthOnly;
        write.block_count = 8;
        write.no_flush = true;

        let report = run_hidden(&write, &SessionState::new()).unwrap();
        assert_eq!(std::fs::metadata(&write.path).unwrap().len(), 8 * 4096);
        assert!(report.timings.preallocation <= report.timings.wall);
    }

    #[test]
    fn preallocation_skipped_for_reads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bench.dat"), vec![0u8; 16 * 4096]).unwrap();
        let mut read = config(&dir, Operation::Read);
        read.preallocation = Preallocation::Zeroed;

        let report = run_hidden(&read, &SessionState::new()).unwrap();
        assert_eq!(report.timings.preallocation, Duration::ZERO);
    }

    #[test]
    fn verification_failure_surfaces_bench_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bench.dat"), vec![0xEEu8; 16 * 4096]).unwrap();
        let mut read = config(&dir, Operation::Read);
        read.verify = true;
        read.asynchronous = true;

        let err = run_hidden(&read, &SessionState::new()).unwrap_err();
        let bench = err.downcast_ref::<BenchError>().unwrap();
        assert!(bench.is_verification());
    }

    #[test]
    fn canceled_session_reports_partial_run() {
        let dir = tempfile::tempdir().unwrap();
        let write = config(&dir, Operation::Write);
        let session = SessionState::new();
        session.cancel();

        let report = run_hidden(&write, &session).unwrap();
        assert!(report.canceled());
        assert_eq!(report.snapshot.blocks_transferred, 0);
    }

    #[test]
    fn open_failure_has_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut write = config(&dir, Operation::Write);
        write.path = dir.path().join("missing").join("bench.dat");

        let err = run_hidden(&write, &SessionState::new()).unwrap_err();
        assert!(err.to_string().starts_with("Failed to open"));
    }
}
