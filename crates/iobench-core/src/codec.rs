//! Deterministic block content and its verification.
//!
//! Counter content stores, in every 8-byte lane, the lane's absolute
//! record index (`byte offset / 8`) as a little-endian `u64`. A block read
//! back from anywhere in a file written this way can be checked without
//! knowing anything but its offset.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{BenchError, ConfigError, Result};

/// Size of one record lane in bytes.
pub const RECORD_UNIT: usize = std::mem::size_of::<u64>();

fn check_size(len: usize) -> Result<()> {
    if len % RECORD_UNIT == 0 {
        Ok(())
    } else {
        Err(ConfigError::UnalignedBlockSize {
            size: len,
            unit: RECORD_UNIT,
        }
        .into())
    }
}

/// Writes the counter pattern for a block at `offset`.
pub fn fill_counter(buf: &mut [u8], offset: u64) -> Result<()> {
    check_size(buf.len())?;
    let first = offset / RECORD_UNIT as u64;
    for (record, lane) in (first..).zip(buf.chunks_exact_mut(RECORD_UNIT)) {
        lane.copy_from_slice(&record.to_le_bytes());
    }
    Ok(())
}

/// Checks a block read from `offset` against the counter pattern.
///
/// Reports the absolute byte offset of the first lane that differs.
pub fn verify(buf: &[u8], offset: u64) -> Result<()> {
    check_size(buf.len())?;
    let first = offset / RECORD_UNIT as u64;
    for (i, lane) in buf.chunks_exact(RECORD_UNIT).enumerate() {
        let expected = first + i as u64;
        if lane != expected.to_le_bytes() {
            return Err(BenchError::Verification {
                offset: offset + (i * RECORD_UNIT) as u64,
            });
        }
    }
    Ok(())
}

/// Produces block content for writes.
///
/// Owns its random source so that runs with the same seed write the same
/// bytes and separate sessions never share generator state.
#[derive(Debug, Clone)]
pub struct ContentGenerator {
    rng: Option<ChaCha8Rng>,
}

impl ContentGenerator {
    /// Counter content, verifiable on read-back.
    pub fn counter() -> Self {
        Self { rng: None }
    }

    /// Pseudorandom content from a ChaCha8 stream. Not verifiable.
    pub fn random(seed: u64) -> Self {
        Self {
            rng: Some(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn new(random_content: bool, seed: u64) -> Self {
        if random_content {
            Self::random(seed)
        } else {
            Self::counter()
        }
    }

    pub fn is_random(&self) -> bool {
        self.rng.is_some()
    }

    /// Fills `buf` as the block destined for `offset`.
    pub fn fill(&mut self, buf: &mut [u8], offset: u64) -> Result<()> {
        match &mut self.rng {
            None => fill_counter(buf, offset),
            Some(rng) => {
                check_size(buf.len())?;
                for lane in buf.chunks_exact_mut(RECORD_UNIT) {
                    lane.copy_from_slice(&rng.next_u64().to_le_bytes());
                }
                Ok(())
            }
        }
    }
}
