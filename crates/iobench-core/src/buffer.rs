//! Page-aligned request buffers and the slot table of the asynchronous driver.
//!
//! Buffers are aligned to [`ALIGNMENT`] so a target opened for unbuffered
//! (direct) I/O accepts them without a bounce copy.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::error::{BenchError, ConfigError, Result};

/// Alignment of every request buffer.
pub const ALIGNMENT: usize = 4096;

/// Zero-initialized heap buffer aligned to [`ALIGNMENT`].
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: the buffer owns its allocation exclusively.
unsafe impl Send for AlignedBuffer {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocates `len` zeroed bytes.
    ///
    /// Fails with [`BenchError::ResourceExhaustion`] when the allocator
    /// refuses the request.
    pub fn try_new(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(ConfigError::ZeroBlockSize.into());
        }
        let layout = Layout::from_size_align(len, ALIGNMENT)
            .map_err(|_| BenchError::ResourceExhaustion { bytes: len })?;

        // SAFETY: layout has a nonzero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(BenchError::ResourceExhaustion { bytes: len })?;

        Ok(Self { ptr, layout })
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for layout.size() initialized bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for layout.size() bytes and uniquely borrowed.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in try_new with this exact layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len())
            .field("align", &self.layout.align())
            .finish()
    }
}

/// Index of a request slot, carried through the port as the completion's
/// correlation identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

#[derive(Debug)]
struct Slot {
    /// `None` while the buffer is lent to the port.
    buffer: Option<AlignedBuffer>,
    offset: u64,
}

/// Fixed table of request slots with a free-slot stack.
///
/// A slot is either free (its buffer is home) or in flight (its buffer is
/// owned by the port). The in-flight count is derived from the free stack,
/// so it can never drift from the slots actually lent out.
#[derive(Debug)]
pub struct SlotArena {
    slots: Vec<Slot>,
    free: Vec<SlotId>,
    block_size: usize,
}

impl SlotArena {
    /// Allocates `count` buffers of `block_size` bytes up front.
    pub fn new(count: usize, block_size: usize) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(count)
            .map_err(|_| BenchError::ResourceExhaustion {
                bytes: count.saturating_mul(block_size),
            })?;
        for _ in 0..count {
            slots.push(Slot {
                buffer: Some(AlignedBuffer::try_new(block_size)?),
                offset: 0,
            });
        }

        // Popped from the back, so slot 0 is handed out first.
        let free = (0..count as u32).rev().map(SlotId).collect();

        Ok(Self {
            slots,
            free,
            block_size,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn in_flight(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn has_free(&self) -> bool {
        !self.free.is_empty()
    }

    /// Takes a free slot for a request targeting `offset` and lends out its
    /// buffer. Returns `None` when every slot is in flight.
    pub fn acquire(&mut self, offset: u64) -> Option<(SlotId, AlignedBuffer)> {
        let id = self.free.pop()?;
        let slot = &mut self.slots[id.index()];
        let buffer = slot.buffer.take()?;
        slot.offset = offset;
        Some((id, buffer))
    }

    /// Returns a completed slot's buffer and frees the slot.
    ///
    /// Yields the offset recorded at acquisition, or `None` if `id` is not
    /// an in-flight slot of this arena.
    pub fn release(&mut self, id: SlotId, buffer: AlignedBuffer) -> Option<u64> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.buffer.is_some() {
            return None;
        }
        slot.buffer = Some(buffer);
        self.free.push(id);
        Some(slot.offset)
    }

    /// Offset recorded for an in-flight slot.
    pub fn offset(&self, id: SlotId) -> Option<u64> {
        let slot = self.slots.get(id.index())?;
        slot.buffer.is_none().then_some(slot.offset)
    }

    /// Buffer of a free slot.
    pub fn buffer(&self, id: SlotId) -> Option<&AlignedBuffer> {
        self.slots.get(id.index())?.buffer.as_ref()
    }
}
