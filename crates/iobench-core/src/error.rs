//! Error types for the benchmark engine.
//!
//! Every error is fatal to the call that produced it. Cancellation is not an
//! error: a canceled run returns `Ok` with a partial block count.

use std::{fmt, io};

use thiserror::Error;

use crate::config::Operation;

/// Contract violations detected before any I/O is issued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("generator width {0} out of range (2-16)")]
    InvalidWidth(u32),
    #[error("block size {size} is not a multiple of the {unit}-byte record unit")]
    UnalignedBlockSize { size: usize, unit: usize },
    #[error("block size must be greater than zero")]
    ZeroBlockSize,
    #[error("verification cannot be combined with random content")]
    VerifyRandomContent,
    #[error("max outstanding requests {0} out of range (1-256)")]
    InvalidOutstanding(usize),
    #[error("random access over {0} blocks needs at least 4 blocks")]
    TooFewBlocksForRandom(u64),
}

/// Where an I/O failure happened.
#[derive(Debug, Clone, Default)]
pub struct IoContext {
    /// The operation being performed
    pub operation: Option<Operation>,
    /// Zero-based index of the block within the run
    pub block: Option<u64>,
    /// Absolute byte offset targeted by the request
    pub offset: Option<u64>,
    /// Bytes the request should have transferred
    pub expected: Option<usize>,
    /// Bytes the request actually transferred
    pub transferred: Option<usize>,
}

impl IoContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    #[must_use]
    pub fn with_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn with_transfer(mut self, expected: usize, transferred: usize) -> Self {
        self.expected = Some(expected);
        self.transferred = Some(transferred);
        self
    }
}

impl fmt::Display for IoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(operation) = self.operation {
            parts.push(operation.to_string());
        }
        if let Some(block) = self.block {
            parts.push(format!("block {block}"));
        }
        if let Some(offset) = self.offset {
            parts.push(format!("offset {offset}"));
        }
        if let (Some(expected), Some(transferred)) = (self.expected, self.transferred) {
            parts.push(format!("{transferred}/{expected} bytes"));
        }

        if parts.is_empty() {
            write!(f, "(no context)")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("could not allocate {bytes} bytes of request buffers")]
    ResourceExhaustion { bytes: usize },
    #[error("I/O failed at {context}: {source}")]
    Io {
        #[source]
        source: io::Error,
        context: IoContext,
    },
    #[error("data verification failed at byte offset {offset}")]
    Verification { offset: u64 },
}

impl From<io::Error> for BenchError {
    fn from(source: io::Error) -> Self {
        BenchError::Io {
            source,
            context: IoContext::new(),
        }
    }
}

impl BenchError {
    /// Create an IO error with context
    #[must_use]
    pub fn io_with_context(source: io::Error, context: IoContext) -> Self {
        BenchError::Io { source, context }
    }

    /// An I/O call that returned success but moved the wrong number of bytes.
    #[must_use]
    pub fn short_transfer(context: IoContext) -> Self {
        BenchError::Io {
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected transfer size"),
            context,
        }
    }

    /// The device status code carried by an I/O failure, if any.
    pub fn os_status(&self) -> Option<i32> {
        match self {
            BenchError::Io { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    pub fn is_verification(&self) -> bool {
        matches!(self, BenchError::Verification { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, BenchError::Configuration(_))
    }
}

pub type Result<T, E = BenchError> = std::result::Result<T, E>;
