//! One request at a time: issue, wait, verify, advance.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, instrument, trace, warn};

use crate::buffer::AlignedBuffer;
use crate::codec::{self, ContentGenerator};
use crate::config::{Operation, WorkloadConfig};
use crate::error::{BenchError, IoContext, Result};
use crate::offsets::OffsetStream;
use crate::perf::start_count;
use crate::session::{RunOutcome, SessionState};

/// Runs `config` against `handle` with a single blocking request in flight.
///
/// The handle is positioned at offset 0 first. Random patterns reposition
/// it explicitly before every block after the first.
///
/// Stops without error when `session` is canceled, reporting the blocks
/// completed so far.
#[instrument(
    name = "run_synchronous",
    skip_all,
    fields(
        operation = %config.operation,
        pattern = %config.pattern,
        blocks = config.block_count,
        block_size = config.block_size,
    )
)]
pub fn run_synchronous<H>(
    handle: &mut H,
    config: &WorkloadConfig,
    session: &SessionState,
) -> Result<RunOutcome>
where
    H: Read + Write + Seek + ?Sized,
{
    debug!("synchronous run starting");
    let outcome = drive(handle, config, session)
        .inspect_err(|e| warn!(error = %e, "synchronous run aborted"))?;
    debug!(
        transferred = outcome.blocks_transferred,
        canceled = outcome.canceled,
        "synchronous run finished"
    );
    Ok(outcome)
}

fn drive<H>(handle: &mut H, config: &WorkloadConfig, session: &SessionState) -> Result<RunOutcome>
where
    H: Read + Write + Seek + ?Sized,
{
    config.validate()?;
    let mut offsets = OffsetStream::new(config)?;
    let mut buffer = AlignedBuffer::try_new(config.block_size)?;
    let mut content = ContentGenerator::new(config.random_content, session.content_seed());
    let operation = config.operation;
    let block_size = config.block_size;

    handle
        .seek(SeekFrom::Start(0))
        .map_err(|e| BenchError::io_with_context(e, IoContext::new().with_offset(0)))?;

    let mut processed = 0u64;
    while processed < config.block_count && !session.is_canceled() {
        let offset = offsets.current();
        let context = IoContext::new()
            .with_operation(operation)
            .with_block(processed)
            .with_offset(offset);

        if operation.is_write() {
            content.fill(&mut buffer, offset)?;
        }

        let start = start_count();
        let result = match operation {
            Operation::Read => handle.read(&mut buffer),
            Operation::Write => handle.write(&buffer),
        };
        start.stop_and_accumulate(session.read_write_time());

        let transferred = result.map_err(|e| BenchError::io_with_context(e, context.clone()))?;
        if transferred != block_size {
            return Err(BenchError::short_transfer(
                context.with_transfer(block_size, transferred),
            ));
        }

        if operation.is_read() && config.verify {
            codec::verify(&buffer, offset)?;
        }

        processed += 1;
        if processed < config.block_count {
            let next = offsets.advance();
            if offsets.needs_seek() {
                handle.seek(SeekFrom::Start(next)).map_err(|e| {
                    BenchError::io_with_context(e, IoContext::new().with_offset(next))
                })?;
            }
        }

        session.add_blocks_transferred(1);
        session.record_sync_completion();
        trace!(block = processed - 1, offset, "block done");
    }

    Ok(RunOutcome {
        blocks_issued: processed,
        blocks_transferred: processed,
        canceled: processed < config.block_count,
    })
}
