//! Workload configuration shared by both drivers.

use std::fmt;

use crate::codec::RECORD_UNIT;
use crate::error::{ConfigError, Result};

/// Largest number of requests the asynchronous driver keeps in flight.
pub const MAX_OUTSTANDING_LIMIT: usize = 256;

/// Direction of the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn is_read(self) -> bool {
        self == Self::Read
    }

    pub fn is_write(self) -> bool {
        self == Self::Write
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order in which blocks are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessPattern {
    #[default]
    Sequential,
    /// Full-period LFSR over the block indices.
    Random,
}

impl AccessPattern {
    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Random => "random",
        }
    }
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable description of one benchmark call.
///
/// `max_outstanding` is only consulted by the asynchronous driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub operation: Operation,
    pub pattern: AccessPattern,
    /// Check read-back content against the counter pattern.
    pub verify: bool,
    pub block_count: u64,
    pub block_size: usize,
    /// Fill written blocks with pseudorandom data instead of the counter pattern.
    pub random_content: bool,
    pub max_outstanding: usize,
}

impl WorkloadConfig {
    /// A sequential, unverified, counter-content workload.
    pub fn new(operation: Operation, block_count: u64, block_size: usize) -> Self {
        Self {
            operation,
            pattern: AccessPattern::Sequential,
            verify: false,
            block_count,
            block_size,
            random_content: false,
            max_outstanding: 8,
        }
    }

    #[must_use]
    pub fn with_pattern(mut self, pattern: AccessPattern) -> Self {
        self.pattern = pattern;
        self
    }

    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    #[must_use]
    pub fn with_random_content(mut self, random_content: bool) -> Self {
        self.random_content = random_content;
        self
    }

    #[must_use]
    pub fn with_max_outstanding(mut self, max_outstanding: usize) -> Self {
        self.max_outstanding = max_outstanding;
        self
    }

    /// Total bytes the workload moves when it runs to completion.
    pub fn total_bytes(&self) -> u64 {
        self.block_count.saturating_mul(self.block_size as u64)
    }

    /// Checks the contract shared by both drivers.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize.into());
        }
        if self.block_size % RECORD_UNIT != 0 {
            return Err(ConfigError::UnalignedBlockSize {
                size: self.block_size,
                unit: RECORD_UNIT,
            }
            .into());
        }
        if self.verify && self.random_content {
            return Err(ConfigError::VerifyRandomContent.into());
        }
        Ok(())
    }

    /// Adds the outstanding-request bound to [`validate`](Self::validate).
    pub fn validate_async(&self) -> Result<()> {
        self.validate()?;
        if self.max_outstanding == 0 || self.max_outstanding > MAX_OUTSTANDING_LIMIT {
            return Err(ConfigError::InvalidOutstanding(self.max_outstanding).into());
        }
        Ok(())
    }
}
