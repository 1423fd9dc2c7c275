//! Linux completion port on a native io_uring completion queue.
//!
//! The slot id travels as the entry's `user_data`. Buffers stay parked in
//! the port while the kernel owns them and go back out with their
//! completion.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io;
use std::os::fd::AsRawFd;

use io_uring::{IoUring, opcode, squeue, types};
use tracing::{debug, error, trace};

use super::{Completion, CompletionPort, IoRequest, SubmitStatus};
use crate::buffer::{AlignedBuffer, SlotId};
use crate::config::Operation;

/// io_uring port over a borrowed file.
pub struct UringPort<'f> {
    ring: IoUring,
    file: &'f File,
    /// Buffers currently owned by the kernel, keyed by slot.
    in_flight: HashMap<SlotId, AlignedBuffer>,
    /// Completions harvested but not yet handed to the caller.
    ready: VecDeque<Completion>,
}

impl<'f> UringPort<'f> {
    pub fn new(file: &'f File, depth: usize) -> io::Result<Self> {
        let entries = u32::try_from(depth.max(1).next_power_of_two())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "queue depth too large"))?;
        let ring = IoUring::new(entries)?;
        debug!(entries, "io_uring port created");

        Ok(Self {
            ring,
            file,
            in_flight: HashMap::with_capacity(depth),
            ready: VecDeque::with_capacity(depth),
        })
    }

    fn entry_for(&self, request: &mut IoRequest) -> io::Result<squeue::Entry> {
        let fd = types::Fd(self.file.as_raw_fd());
        let len = u32::try_from(request.buffer.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "block too large"))?;
        let ptr = request.buffer.as_mut_ptr();

        let entry = match request.operation {
            Operation::Read => opcode::Read::new(fd, ptr, len).offset(request.offset).build(),
            Operation::Write => opcode::Write::new(fd, ptr.cast_const(), len)
                .offset(request.offset)
                .build(),
        };
        Ok(entry.user_data(u64::from(request.slot.0)))
    }

    /// Moves every available CQE into `ready`. Reports whether one of them
    /// belonged to `slot`.
    fn harvest(&mut self, slot: Option<SlotId>) -> bool {
        let mut saw_slot = false;
        let cqes: Vec<(u64, i32)> = self
            .ring
            .completion()
            .map(|cqe| (cqe.user_data(), cqe.result()))
            .collect();

        for (user_data, res) in cqes {
            let Ok(id) = u32::try_from(user_data).map(SlotId) else {
                error!(user_data, "io_uring completion with foreign user_data");
                continue;
            };
            let Some(buffer) = self.in_flight.remove(&id) else {
                error!(slot = id.0, "io_uring completion for a slot not in flight");
                continue;
            };

            let result = if res < 0 {
                Err(io::Error::from_raw_os_error(-res))
            } else {
                Ok(res.unsigned_abs() as usize)
            };
            trace!(slot = id.0, res, "io_uring completion");

            saw_slot |= slot == Some(id);
            self.ready.push_back(Completion {
                slot: id,
                buffer,
                result,
            });
        }
        saw_slot
    }

    fn submit_and_wait_one(&mut self) -> io::Result<()> {
        loop {
            match self.ring.submit_and_wait(1) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

impl CompletionPort for UringPort<'_> {
    fn submit(&mut self, mut request: IoRequest) -> io::Result<SubmitStatus> {
        if self.in_flight.contains_key(&request.slot) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is already in flight", request.slot),
            ));
        }

        let entry = self.entry_for(&mut request)?;

        // SAFETY: the buffer behind `entry` is parked in `in_flight` until
        // its CQE is harvested, and Drop waits for every outstanding entry.
        let pushed = unsafe { self.ring.submission().push(&entry) };
        if pushed.is_err() {
            return Err(io::Error::other("io_uring submission queue is full"));
        }
        self.in_flight.insert(request.slot, request.buffer);

        self.ring.submit()?;
        let inline = self.harvest(Some(request.slot));
        Ok(if inline {
            SubmitStatus::CompletedInline
        } else {
            SubmitStatus::Pending
        })
    }

    fn wait(&mut self, completions: &mut Vec<Completion>, max: usize) -> io::Result<()> {
        if self.ready.is_empty() {
            self.submit_and_wait_one()?;
            self.harvest(None);
        }

        let take = max.max(1).min(self.ready.len());
        completions.extend(self.ready.drain(..take));
        Ok(())
    }
}

impl Drop for UringPort<'_> {
    fn drop(&mut self) {
        while !self.in_flight.is_empty() {
            if let Err(e) = self.submit_and_wait_one() {
                // The kernel may still write into these buffers.
                error!(
                    error = %e,
                    outstanding = self.in_flight.len(),
                    "io_uring drain failed, leaking buffers"
                );
                for (_, buffer) in self.in_flight.drain() {
                    std::mem::forget(buffer);
                }
                break;
            }
            self.harvest(None);
        }
    }
}

impl std::fmt::Debug for UringPort<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UringPort")
            .field("in_flight", &self.in_flight.len())
            .field("ready", &self.ready.len())
            .finish_non_exhaustive()
    }
}
