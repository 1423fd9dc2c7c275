//! Bounded-concurrency driver over a [`CompletionPort`].
//!
//! Up to `max_outstanding` requests are kept in flight. Each outer
//! iteration fills every free slot with a new request, then blocks until
//! the port reports at least one completion and reaps the whole batch.
//! Completions are matched to their slot by identity, never by order.

use std::fs::File;
use std::io;

use tracing::{debug, instrument, trace, warn};

use crate::buffer::{SlotArena, SlotId};
use crate::codec::{self, ContentGenerator};
use crate::config::WorkloadConfig;
use crate::error::{BenchError, IoContext, Result};
use crate::offsets::OffsetStream;
use crate::perf::start_count;
use crate::port::{Completion, CompletionPort, IoRequest, SubmitStatus, ThreadPoolPort};
use crate::session::{RunOutcome, SessionState};

/// Runs `config` against `file` through the portable worker-pool port.
pub fn run_asynchronous(
    file: &File,
    config: &WorkloadConfig,
    session: &SessionState,
) -> Result<RunOutcome> {
    config.validate_async()?;
    let mut port = ThreadPoolPort::new(file, config.max_outstanding)?;
    run_asynchronous_with(&mut port, config, session)
}

/// Runs `config` against `file` through the native io_uring port.
#[cfg(all(target_os = "linux", feature = "io-uring"))]
pub fn run_asynchronous_uring(
    file: &File,
    config: &WorkloadConfig,
    session: &SessionState,
) -> Result<RunOutcome> {
    config.validate_async()?;
    let mut port = crate::port::UringPort::new(file, config.max_outstanding)?;
    run_asynchronous_with(&mut port, config, session)
}

/// Runs `config` through any completion port.
///
/// Cancellation stops new submissions but every request already in flight
/// is reaped before the call returns. The first submission or completion
/// failure aborts the call.
#[instrument(
    name = "run_asynchronous",
    skip_all,
    fields(
        operation = %config.operation,
        pattern = %config.pattern,
        blocks = config.block_count,
        block_size = config.block_size,
        outstanding = config.max_outstanding,
    )
)]
pub fn run_asynchronous_with<P>(
    port: &mut P,
    config: &WorkloadConfig,
    session: &SessionState,
) -> Result<RunOutcome>
where
    P: CompletionPort + ?Sized,
{
    debug!("asynchronous run starting");
    let outcome = AsyncRun::new(config, session)
        .and_then(|run| run.drive(port))
        .inspect_err(|e| warn!(error = %e, "asynchronous run aborted"))?;
    debug!(
        transferred = outcome.blocks_transferred,
        canceled = outcome.canceled,
        "asynchronous run finished"
    );
    Ok(outcome)
}

/// State owned by one driver call.
struct AsyncRun<'a> {
    config: &'a WorkloadConfig,
    session: &'a SessionState,
    arena: SlotArena,
    offsets: OffsetStream,
    content: ContentGenerator,
    completions: Vec<Completion>,
    issued: u64,
    reaped: u64,
}

impl<'a> AsyncRun<'a> {
    fn new(config: &'a WorkloadConfig, session: &'a SessionState) -> Result<Self> {
        config.validate_async()?;
        let offsets = OffsetStream::new(config)?;
        let arena = SlotArena::new(config.max_outstanding, config.block_size)?;
        let completions = Vec::with_capacity(config.max_outstanding);

        Ok(Self {
            config,
            session,
            arena,
            offsets,
            content: ContentGenerator::new(config.random_content, session.content_seed()),
            completions,
            issued: 0,
            reaped: 0,
        })
    }

    fn drive<P: CompletionPort + ?Sized>(mut self, port: &mut P) -> Result<RunOutcome> {
        loop {
            let canceled = self.session.is_canceled();
            if !canceled {
                self.submit_ready(port)?;
            }
            if self.arena.in_flight() == 0 {
                break;
            }
            self.reap(port)?;
        }

        debug_assert_eq!(self.issued, self.reaped);
        Ok(RunOutcome {
            blocks_issued: self.issued,
            blocks_transferred: self.reaped,
            canceled: self.reaped < self.config.block_count,
        })
    }

    /// Fills every free slot while blocks remain to issue.
    fn submit_ready<P: CompletionPort + ?Sized>(&mut self, port: &mut P) -> Result<()> {
        let operation = self.config.operation;

        while self.issued < self.config.block_count {
            let offset = self.offsets.current();
            let Some((slot, mut buffer)) = self.arena.acquire(offset) else {
                break;
            };

            if operation.is_write() {
                self.content.fill(&mut buffer, offset)?;
            }

            let request = IoRequest {
                slot,
                operation,
                offset,
                buffer,
            };
            let start = start_count();
            let status = port.submit(request);
            start.stop_and_accumulate(self.session.read_write_time());

            let status = status.map_err(|e| {
                BenchError::io_with_context(e, self.context(offset).with_block(self.issued))
            })?;
            match status {
                SubmitStatus::CompletedInline => self.session.record_sync_completion(),
                SubmitStatus::Pending => self.session.record_async_completion(),
            }
            trace!(slot = slot.0, offset, ?status, "submitted");

            self.issued += 1;
            if self.issued < self.config.block_count {
                self.offsets.advance();
            }
        }
        Ok(())
    }

    /// Waits for at least one completion and retires the batch.
    fn reap<P: CompletionPort + ?Sized>(&mut self, port: &mut P) -> Result<()> {
        self.completions.clear();
        let start = start_count();
        let waited = port.wait(&mut self.completions, self.arena.in_flight());
        start.stop_and_accumulate(self.session.completion_wait_time());
        waited?;

        let mut batch = std::mem::take(&mut self.completions);
        let reaped = batch.len() as u64;
        let result = batch.drain(..).try_for_each(|completion| self.retire(completion));
        self.completions = batch;
        result?;

        // A batch is credited only once every record in it has passed.
        self.session.add_blocks_transferred(reaped);

        debug_assert_eq!(self.issued - self.reaped, self.arena.in_flight() as u64);
        Ok(())
    }

    fn retire(&mut self, completion: Completion) -> Result<()> {
        let Completion {
            slot,
            buffer,
            result,
        } = completion;
        let block_size = self.config.block_size;

        let offset = self.arena.offset(slot).ok_or_else(|| unknown_slot(slot))?;
        let context = self.context(offset);

        let transferred = result.map_err(|e| BenchError::io_with_context(e, context.clone()))?;
        if transferred != block_size {
            return Err(BenchError::short_transfer(
                context.with_transfer(block_size, transferred),
            ));
        }

        if self.config.operation.is_read() && self.config.verify {
            codec::verify(&buffer, offset)?;
        }

        self.arena.release(slot, buffer);
        self.reaped += 1;
        trace!(slot = slot.0, offset, "reaped");
        Ok(())
    }

    fn context(&self, offset: u64) -> IoContext {
        IoContext::new()
            .with_operation(self.config.operation)
            .with_offset(offset)
    }
}

fn unknown_slot(slot: SlotId) -> BenchError {
    BenchError::from(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("completion for {slot}, which is not in flight"),
    ))
}
