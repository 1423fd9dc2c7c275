//! The stream of byte offsets a driver issues requests against.

use crate::config::{AccessPattern, WorkloadConfig};
use crate::error::Result;
use crate::lfsr::FiboLfsr;

/// Sequential counter or LFSR walk, in block-size steps.
///
/// Both patterns start at offset 0. The random pattern then takes one
/// generator value per block.
#[derive(Debug, Clone)]
pub struct OffsetStream {
    pattern: AccessPattern,
    lfsr: FiboLfsr,
    block_size: u64,
    current: u64,
}

impl OffsetStream {
    pub fn new(config: &WorkloadConfig) -> Result<Self> {
        let lfsr = match config.pattern {
            AccessPattern::Sequential => FiboLfsr::exhausted(),
            AccessPattern::Random => FiboLfsr::for_block_count(config.block_count)?,
        };
        Ok(Self {
            pattern: config.pattern,
            lfsr,
            block_size: config.block_size as u64,
            current: 0,
        })
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Moves to the next block and returns its offset.
    pub fn advance(&mut self) -> u64 {
        self.current = match self.pattern {
            AccessPattern::Sequential => self.current + self.block_size,
            AccessPattern::Random => u64::from(self.lfsr.next_value()) * self.block_size,
        };
        self.current
    }

    /// Whether moving to the next block needs an explicit reposition of
    /// a cursor-based handle.
    pub fn needs_seek(&self) -> bool {
        self.pattern == AccessPattern::Random
    }
}
