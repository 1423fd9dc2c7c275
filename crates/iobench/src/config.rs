//! Configuration for a single benchmark run.

use std::path::{Path, PathBuf};

use iobench_core::prep::TargetOptions;
use iobench_core::{AccessPattern, MAX_OUTSTANDING_LIMIT, Operation, WorkloadConfig};

/// Default number of blocks transferred.
pub const DEFAULT_BLOCK_COUNT: u64 = 1024;
/// Default block size (1 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;
/// Default number of asynchronous requests in flight.
pub const DEFAULT_MAX_OUTSTANDING: usize = 8;

/// Smallest accepted block size, and the granularity of every block size.
pub const MIN_BLOCK_SIZE: usize = 4 * 1024;
pub const MAX_BLOCK_SIZE: usize = 8 * 1024 * 1024;

/// Block count bounds for random access.
pub const MIN_RANDOM_BLOCKS: u64 = 4;
pub const MAX_RANDOM_BLOCKS: u64 = 65536;

/// Largest block count of any run (`i32::MAX`).
pub const MAX_BLOCK_COUNT: u64 = 2_147_483_647;

/// How the target is sized before a write run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preallocation {
    #[default]
    None,
    /// Set the length and write a zeroed block at the end.
    Zeroed,
    /// Only set the length.
    LengthOnly,
}

impl Preallocation {
    pub fn is_enabled(self) -> bool {
        self != Self::None
    }
}

/// Everything the runner needs, fixed before the run starts.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunConfig {
    pub path: PathBuf,
    /// Free-form label written to the results file
    pub tag: String,
    pub operation: Operation,
    pub pattern: AccessPattern,
    pub block_count: u64,
    pub block_size: usize,
    pub asynchronous: bool,
    pub max_outstanding: usize,
    pub verify: bool,
    pub random_content: bool,
    pub no_buffering: bool,
    pub write_through: bool,
    /// Drop cached pages of the target after opening it
    pub disable_local_buffering: bool,
    /// Experimental read-ahead hint
    pub enable_prefetch: bool,
    /// Skip the access-pattern hint on open
    pub no_hints: bool,
    /// Skip the final flush after a write run
    pub no_flush: bool,
    pub preallocation: Preallocation,
    /// Use the io_uring port for asynchronous runs
    pub io_uring: bool,
    pub seed: u64,
    pub results_file: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub color: bool,
    pub verbose: bool,
}

impl RunConfig {
    /// A configuration with the tool's defaults for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tag: "Untitled".to_string(),
            operation: Operation::Write,
            pattern: AccessPattern::Sequential,
            block_count: DEFAULT_BLOCK_COUNT,
            block_size: DEFAULT_BLOCK_SIZE,
            asynchronous: false,
            max_outstanding: DEFAULT_MAX_OUTSTANDING,
            verify: false,
            random_content: false,
            no_buffering: false,
            write_through: false,
            disable_local_buffering: false,
            enable_prefetch: false,
            no_hints: false,
            no_flush: false,
            preallocation: Preallocation::None,
            io_uring: false,
            seed: 0,
            results_file: None,
            json: None,
            color: false,
            verbose: false,
        }
    }

    /// Total bytes a complete run moves.
    pub fn total_bytes(&self) -> u64 {
        self.block_count.saturating_mul(self.block_size as u64)
    }

    /// The engine's view of this run.
    pub fn workload(&self) -> WorkloadConfig {
        WorkloadConfig::new(self.operation, self.block_count, self.block_size)
            .with_pattern(self.pattern)
            .with_verify(self.verify)
            .with_random_content(self.random_content)
            .with_max_outstanding(self.max_outstanding)
    }

    /// Flags used to open the target.
    pub fn target_options(&self) -> TargetOptions {
        TargetOptions::new(self.operation)
            .with_no_buffering(self.no_buffering)
            .with_write_through(self.write_through)
            .with_access_hint((!self.no_hints).then_some(self.pattern))
    }

    /// Every rule this configuration breaks, in a fixed order.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut fail_if = |broken: bool, message: &str| {
            if broken {
                issues.push(message.to_string());
            }
        };

        fail_if(self.path.as_os_str().is_empty(), "Invalid file path.");
        fail_if(
            self.pattern == AccessPattern::Random
                && (!self.block_count.is_power_of_two()
                    || !(MIN_RANDOM_BLOCKS..=MAX_RANDOM_BLOCKS).contains(&self.block_count)),
            "Random access operations must use a block count that is between 4 and 65536 and is a power of 2.",
        );
        fail_if(
            self.block_count > MAX_BLOCK_COUNT
                || self.block_count.checked_mul(self.block_size as u64).is_none(),
            "Block count must not exceed 2147483647.",
        );
        fail_if(
            self.max_outstanding == 0 || self.max_outstanding > MAX_OUTSTANDING_LIMIT,
            "Max outstanding asynchronous transfers must be between 1 and 256.",
        );
        fail_if(
            !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size),
            "Block size must be between 4kB and 8MB.",
        );
        fail_if(
            self.block_size % MIN_BLOCK_SIZE != 0,
            "Block size must be a multiple of 4kB.",
        );
        fail_if(
            self.verify && self.random_content,
            "Read verification cannot be combined with random content.",
        );
        fail_if(
            !self.path.as_os_str().is_empty() && !is_valid_target(&self.path),
            "Path must be to an existing file or a new file to create in an existing directory.",
        );

        issues
    }

    /// Advisories that do not stop the run.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.enable_prefetch {
            warnings.push("Experimental option \"enable-prefetch\" is in use.".to_string());
        }
        if self.verify && self.operation.is_write() {
            warnings.push("Read verification has no effect on a write run.".to_string());
        }
        if self.random_content && self.operation.is_read() {
            warnings.push("Random content has no effect on a read run.".to_string());
        }
        warnings
    }

    /// Logs every issue and warning, failing if there was at least one issue.
    pub fn validate(&self) -> anyhow::Result<()> {
        for warning in self.warnings() {
            tracing::warn!("{warning}");
        }

        let issues = self.issues();
        for issue in &issues {
            tracing::error!("Configuration issue: {issue}");
        }

        match issues.len() {
            0 => Ok(()),
            1 => anyhow::bail!("invalid configuration: {}", issues[0]),
            n => anyhow::bail!("invalid configuration ({n} issues)"),
        }
    }
}

/// An existing file, or a new file in an existing directory.
fn is_valid_target(path: &Path) -> bool {
    if path.is_dir() {
        return false;
    }
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => true,
        Some(parent) => parent.is_dir(),
        None => false,
    }
}
