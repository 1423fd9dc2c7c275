//! In-memory device and scripted completion port for driver tests.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::codec;
use crate::config::Operation;
use crate::port::{Completion, CompletionPort, IoRequest, SubmitStatus};
use crate::session::SessionState;

/// Failure injected into one device call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Fault {
    /// Transfer only this many bytes.
    Short(usize),
    /// Fail with this OS status code.
    Status(i32),
}

/// Growable byte device that records the offset of every transfer.
#[derive(Debug, Default)]
pub(crate) struct MemoryDevice {
    data: Vec<u8>,
    pos: u64,
    offsets: Vec<u64>,
    faults: HashMap<usize, Fault>,
}

impl MemoryDevice {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            data: vec![0; len],
            ..Self::default()
        }
    }

    /// Device already holding counter content for `blocks` blocks.
    pub(crate) fn counter_filled(blocks: usize, block_size: usize) -> Self {
        let mut device = Self::new(blocks * block_size);
        codec::fill_counter(&mut device.data, 0).unwrap();
        device
    }

    /// Applies `fault` to the transfer with index `op` (zero-based).
    pub(crate) fn with_fault(mut self, op: usize, fault: Fault) -> Self {
        self.faults.insert(op, fault);
        self
    }

    pub(crate) fn offsets(&self) -> Vec<u64> {
        self.offsets.clone()
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    fn begin(&mut self, offset: u64, len: usize) -> io::Result<usize> {
        let op = self.offsets.len();
        self.offsets.push(offset);
        match self.faults.get(&op) {
            Some(Fault::Status(code)) => Err(io::Error::from_raw_os_error(*code)),
            Some(Fault::Short(n)) => Ok((*n).min(len)),
            None => Ok(len),
        }
    }

    pub(crate) fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let len = self.begin(offset, buf.len())?;
        let start = usize::try_from(offset).unwrap().min(self.data.len());
        let n = len.min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    pub(crate) fn write_at(&mut self, buf: &[u8], offset: u64) -> io::Result<usize> {
        let n = self.begin(offset, buf.len())?;
        let start = usize::try_from(offset).unwrap();
        if self.data.len() < start + n {
            self.data.resize(start + n, 0);
        }
        self.data[start..start + n].copy_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl Read for MemoryDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemoryDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.write_at(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryDevice {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::End(d) => self.data.len().saturating_add_signed(d as isize) as u64,
            SeekFrom::Current(d) => self.pos.saturating_add_signed(d),
        };
        Ok(self.pos)
    }
}

/// Completion port that performs each request against a [`MemoryDevice`]
/// at submission time and hands completions back under test control.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPort {
    device: MemoryDevice,
    pending: VecDeque<Completion>,
    reversed: bool,
    inline_every: Option<usize>,
    reject_submit: Option<usize>,
    failures: HashMap<usize, io::ErrorKind>,
    statuses: HashMap<usize, i32>,
    short: HashMap<usize, usize>,
    cancel_after: Option<(usize, Arc<SessionState>)>,
    submits: usize,
    offsets: Vec<u64>,
    peak: usize,
}

impl ScriptedPort {
    pub(crate) fn new(device: MemoryDevice) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    /// Deliver the newest completion first.
    pub(crate) fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Report every `n`th accepted submission as completed inline.
    pub(crate) fn inline_every(mut self, n: usize) -> Self {
        self.inline_every = Some(n);
        self
    }

    /// Refuse submission attempt `n`.
    pub(crate) fn reject_submit(mut self, n: usize) -> Self {
        self.reject_submit = Some(n);
        self
    }

    /// Complete request `n` with OS status `code`.
    pub(crate) fn fail_request(mut self, n: usize, code: i32) -> Self {
        self.statuses.insert(n, code);
        self
    }

    /// Complete request `n` with an error of `kind` and no OS status.
    pub(crate) fn fail_request_kind(mut self, n: usize, kind: io::ErrorKind) -> Self {
        self.failures.insert(n, kind);
        self
    }

    /// Complete request `n` having moved only `bytes`.
    pub(crate) fn short_request(mut self, n: usize, bytes: usize) -> Self {
        self.short.insert(n, bytes);
        self
    }

    /// Cancel `session` once `n` requests have been accepted.
    pub(crate) fn cancel_after(mut self, n: usize, session: Arc<SessionState>) -> Self {
        self.cancel_after = Some((n, session));
        self
    }

    /// Offsets of accepted requests, in submission order.
    pub(crate) fn offsets(&self) -> Vec<u64> {
        self.offsets.clone()
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak
    }

    pub(crate) fn device(&self) -> &MemoryDevice {
        &self.device
    }
}

impl CompletionPort for ScriptedPort {
    fn submit(&mut self, request: IoRequest) -> io::Result<SubmitStatus> {
        let n = self.submits;
        self.submits += 1;
        if self.reject_submit == Some(n) {
            return Err(io::Error::from_raw_os_error(22));
        }

        let IoRequest {
            slot,
            operation,
            offset,
            mut buffer,
        } = request;
        self.offsets.push(offset);

        let mut result = match operation {
            Operation::Read => self.device.read_at(&mut buffer, offset),
            Operation::Write => self.device.write_at(&buffer, offset),
        };
        if let Some(bytes) = self.short.get(&n) {
            result = Ok(*bytes);
        }
        if let Some(kind) = self.failures.get(&n) {
            result = Err(io::Error::from(*kind));
        }
        if let Some(code) = self.statuses.get(&n) {
            result = Err(io::Error::from_raw_os_error(*code));
        }

        self.pending.push_back(Completion {
            slot,
            buffer,
            result,
        });
        self.peak = self.peak.max(self.pending.len());

        if let Some((after, session)) = &self.cancel_after
            && self.offsets.len() >= *after
        {
            session.cancel();
        }

        let inline = self.inline_every.is_some_and(|k| (n + 1) % k == 0);
        Ok(if inline {
            SubmitStatus::CompletedInline
        } else {
            SubmitStatus::Pending
        })
    }

    fn wait(&mut self, completions: &mut Vec<Completion>, max: usize) -> io::Result<()> {
        if self.pending.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "wait with nothing in flight would block forever",
            ));
        }
        for _ in 0..max.max(1) {
            let next = if self.reversed {
                self.pending.pop_back()
            } else {
                self.pending.pop_front()
            };
            match next {
                Some(completion) => completions.push(completion),
                None => break,
            }
        }
        Ok(())
    }
}
