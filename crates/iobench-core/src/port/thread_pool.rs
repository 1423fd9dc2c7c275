//! Portable completion port backed by a fixed pool of I/O threads.
//!
//! Each worker performs one positional read or write per request, so the
//! file cursor is never shared between in-flight requests. Completions
//! flow back through a channel and are reaped in batches.

use std::fs::File;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use tracing::{debug, trace};

use super::{Completion, CompletionPort, IoRequest, SubmitStatus};
use crate::config::Operation;

/// Worker-pool port with one thread per outstanding request.
pub struct ThreadPoolPort {
    /// Dropped first on shutdown so workers drain and exit.
    submit_tx: Option<Sender<IoRequest>>,
    completion_rx: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolPort {
    /// Starts `depth` workers sharing a duplicate handle of `file`.
    pub fn new(file: &File, depth: usize) -> io::Result<Self> {
        let depth = depth.max(1);
        let file = Arc::new(file.try_clone()?);

        // Neither channel can fill: the driver never has more than `depth`
        // requests submitted and not yet reaped.
        let (submit_tx, submit_rx) = bounded::<IoRequest>(depth);
        let (completion_tx, completion_rx) = bounded::<Completion>(depth);

        let mut workers = Vec::with_capacity(depth);
        for worker_id in 0..depth {
            let rx = submit_rx.clone();
            let tx = completion_tx.clone();
            let file = Arc::clone(&file);

            let handle = thread::Builder::new()
                .name(format!("iobench-io-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &file, &rx, &tx))?;
            workers.push(handle);
        }

        debug!(threads = depth, "I/O worker pool started");

        Ok(Self {
            submit_tx: Some(submit_tx),
            completion_rx,
            workers,
        })
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }
}

impl CompletionPort for ThreadPoolPort {
    fn submit(&mut self, request: IoRequest) -> io::Result<SubmitStatus> {
        let tx = self.submit_tx.as_ref().ok_or_else(shut_down)?;
        tx.send(request).map_err(|_| shut_down())?;
        Ok(SubmitStatus::Pending)
    }

    fn wait(&mut self, completions: &mut Vec<Completion>, max: usize) -> io::Result<()> {
        let first = self.completion_rx.recv().map_err(|_| shut_down())?;
        completions.push(first);

        for _ in 1..max {
            match self.completion_rx.try_recv() {
                Ok(completion) => completions.push(completion),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        Ok(())
    }
}

impl Drop for ThreadPoolPort {
    fn drop(&mut self) {
        // Workers finish any queued request before seeing the disconnect.
        drop(self.submit_tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("I/O worker pool stopped");
    }
}

impl std::fmt::Debug for ThreadPoolPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolPort")
            .field("threads", &self.workers.len())
            .field("running", &self.submit_tx.is_some())
            .finish()
    }
}

fn shut_down() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "I/O worker pool has shut down")
}

fn worker_loop(
    worker_id: usize,
    file: &File,
    rx: &Receiver<IoRequest>,
    tx: &Sender<Completion>,
) {
    for mut request in rx {
        let result = transfer(file, request.operation, request.offset, &mut request.buffer);
        trace!(
            worker_id,
            slot = request.slot.0,
            offset = request.offset,
            ok = result.is_ok(),
            "request finished"
        );

        let completion = Completion {
            slot: request.slot,
            buffer: request.buffer,
            result,
        };
        if tx.send(completion).is_err() {
            break;
        }
    }
}

#[cfg(unix)]
fn transfer(file: &File, operation: Operation, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    match operation {
        Operation::Read => file.read_at(buf, offset),
        Operation::Write => file.write_at(buf, offset),
    }
}

#[cfg(windows)]
fn transfer(file: &File, operation: Operation, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    match operation {
        Operation::Read => file.seek_read(buf, offset),
        Operation::Write => file.seek_write(buf, offset),
    }
}

#[cfg(not(any(unix, windows)))]
fn transfer(_: &File, _: Operation, _: u64, _: &mut [u8]) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "positional I/O is not available on this platform",
    ))
}
