//! Block-level storage I/O benchmark engine.
//!
//! Drives read or write workloads of a fixed block count and block size
//! against an open file, sequentially or in a full-period pseudorandom
//! order, optionally verifying what it reads back:
//!
//! - [`run_synchronous`]: one blocking request at a time
//! - [`run_asynchronous`]: up to `max_outstanding` requests in flight over a
//!   [`CompletionPort`], completions reaped in batches and in any order
//!
//! Counters and the cancellation flag live in a [`SessionState`] owned by
//! the caller, which may read it (and cancel) from another thread while a
//! run is in progress.

pub mod async_driver;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod lfsr;
pub mod offsets;
pub mod perf;
pub mod port;
pub mod prep;
pub mod session;
pub mod sync_driver;

#[cfg(test)]
mod testing;

#[cfg(all(target_os = "linux", feature = "io-uring"))]
pub use async_driver::run_asynchronous_uring;
pub use async_driver::{run_asynchronous, run_asynchronous_with};
pub use config::{AccessPattern, MAX_OUTSTANDING_LIMIT, Operation, WorkloadConfig};
pub use error::{BenchError, ConfigError, IoContext, Result};
pub use lfsr::FiboLfsr;
pub use port::{CompletionPort, ThreadPoolPort};
pub use session::{RunOutcome, SessionSnapshot, SessionState};
pub use sync_driver::run_synchronous;
