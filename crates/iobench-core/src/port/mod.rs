//! Asynchronous I/O ports.
//!
//! A port accepts non-blocking requests and reports their completions in
//! batches, in whatever order the device finishes them. Every request
//! carries the [`SlotId`] it was issued from, and every completion hands
//! that identity back together with the request's buffer.
//!
//! Each accepted submission produces exactly one [`Completion`] through
//! [`CompletionPort::wait`], including submissions that reported
//! [`SubmitStatus::CompletedInline`].

use std::io;

use crate::buffer::{AlignedBuffer, SlotId};
use crate::config::Operation;

mod thread_pool;
#[cfg(all(target_os = "linux", feature = "io-uring"))]
mod uring;

pub use thread_pool::ThreadPoolPort;
#[cfg(all(target_os = "linux", feature = "io-uring"))]
pub use uring::UringPort;

/// One block-sized transfer handed to a port.
#[derive(Debug)]
pub struct IoRequest {
    pub slot: SlotId,
    pub operation: Operation,
    pub offset: u64,
    /// Source for writes, destination for reads.
    pub buffer: AlignedBuffer,
}

/// How a port accepted a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// The request is in progress.
    Pending,
    /// The request finished while it was being submitted.
    CompletedInline,
}

/// A finished request.
#[derive(Debug)]
pub struct Completion {
    pub slot: SlotId,
    pub buffer: AlignedBuffer,
    /// Bytes transferred, or the status the device reported.
    pub result: io::Result<usize>,
}

/// Submit/reap interface implemented per platform mechanism.
pub trait CompletionPort {
    /// Starts a request. An `Err` means the request was never accepted.
    fn submit(&mut self, request: IoRequest) -> io::Result<SubmitStatus>;

    /// Blocks until at least one request completes, then appends up to
    /// `max` completions to `completions`. There is no timeout.
    fn wait(&mut self, completions: &mut Vec<Completion>, max: usize) -> io::Result<()>;
}

impl<P: CompletionPort + ?Sized> CompletionPort for &mut P {
    fn submit(&mut self, request: IoRequest) -> io::Result<SubmitStatus> {
        (**self).submit(request)
    }

    fn wait(&mut self, completions: &mut Vec<Completion>, max: usize) -> io::Result<()> {
        (**self).wait(completions, max)
    }
}

impl<P: CompletionPort + ?Sized> CompletionPort for Box<P> {
    fn submit(&mut self, request: IoRequest) -> io::Result<SubmitStatus> {
        (**self).submit(request)
    }

    fn wait(&mut self, completions: &mut Vec<Completion>, max: usize) -> io::Result<()> {
        (**self).wait(completions, max)
    }
}
