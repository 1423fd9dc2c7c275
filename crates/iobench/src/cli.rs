//! Command-line interface for the benchmark.

// Allow CLI-specific patterns
#![allow(clippy::struct_excessive_bools)]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use iobench_core::{AccessPattern, Operation};
use thiserror::Error;

use crate::config::{DEFAULT_BLOCK_COUNT, Preallocation, RunConfig};

/// Block-level storage I/O benchmark.
///
/// Reads or writes a file in fixed-size blocks, either sequentially or in a
/// pseudorandom order that visits every block exactly once, and reports the
/// time spent in each stage of the transfer.
#[derive(Parser, Debug)]
#[command(name = "iobench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File to benchmark. Created if it does not exist.
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Operation to perform.
    ///
    /// Valid values: sw (sequential write), sr (sequential read),
    /// rw (random write), rr (random read)
    #[arg(short = 'o', long = "op", value_enum, default_value = "sw")]
    pub op: OpCode,

    /// Number of blocks to transfer [default: 1024].
    #[arg(short = 'b', long = "blocks", conflicts_with = "file_size")]
    pub blocks: Option<u64>,

    /// Size of each block (e.g. 4K, 64KiB, 1M).
    ///
    /// Must be a multiple of 4K between 4K and 8M.
    #[arg(short = 's', long, value_parser = parse_size_arg, default_value = "1M")]
    pub block_size: u64,

    /// Total file size (e.g. 512M, 2G). Sets the block count.
    ///
    /// Must be a multiple of the block size.
    #[arg(short = 'f', long, value_parser = parse_size_arg)]
    pub file_size: Option<u64>,

    /// Keep several requests in flight instead of one at a time.
    #[arg(short = 'a', long = "async")]
    pub asynchronous: bool,

    /// Maximum requests in flight for asynchronous runs (1-256).
    #[arg(short = 'q', long, default_value = "8")]
    pub max_outstanding: usize,

    /// Use the io_uring completion port for asynchronous runs.
    #[cfg(all(target_os = "linux", feature = "io-uring"))]
    #[arg(long, requires = "asynchronous")]
    pub io_uring: bool,

    /// Check that every block read holds the pattern this tool writes.
    #[arg(long)]
    pub verify: bool,

    /// Write pseudorandom data instead of the verifiable counter pattern.
    #[arg(long, conflicts_with = "verify")]
    pub random_content: bool,

    /// Seed for --random-content. Defaults to the current time.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Bypass the operating system page cache.
    #[arg(long)]
    pub no_buffering: bool,

    /// Complete each write only once it reaches stable storage.
    #[arg(long)]
    pub write_through: bool,

    /// Drop the target's cached pages before transferring.
    #[arg(long)]
    pub disable_local_buffering: bool,

    /// Ask the storage stack to prefetch the target (experimental).
    #[arg(long)]
    pub enable_prefetch: bool,

    /// Do not advise the kernel of the access pattern.
    #[arg(long)]
    pub no_hints: bool,

    /// Do not flush written data before stopping the transfer clock.
    #[arg(long)]
    pub no_flush: bool,

    /// Preallocate the file before writing, zeroing its last block.
    #[arg(long, conflicts_with = "preallocate_length")]
    pub preallocate: bool,

    /// Preallocate the file before writing by setting its length only.
    #[arg(long)]
    pub preallocate_length: bool,

    /// Label for this run in the results file.
    #[arg(short = 't', long)]
    pub tag: Option<String>,

    /// Append a tab-separated result line to this file.
    ///
    /// Can also be set via IOBENCH_RESULTS environment variable.
    #[arg(short = 'r', long, value_name = "PATH", env = "IOBENCH_RESULTS")]
    pub results_file: Option<PathBuf>,

    /// Export results to JSON file.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long, conflicts_with = "color")]
    pub no_color: bool,

    /// Force colored output (even when not a TTY).
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Verbose output.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Access pattern and direction, in the tool's two-letter shorthand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OpCode {
    #[value(name = "sw", alias = "seq-write")]
    SequentialWrite,
    #[value(name = "sr", alias = "seq-read")]
    SequentialRead,
    #[value(name = "rw", alias = "rand-write")]
    RandomWrite,
    #[value(name = "rr", alias = "rand-read")]
    RandomRead,
}

impl OpCode {
    pub fn operation(self) -> Operation {
        match self {
            Self::SequentialWrite | Self::RandomWrite => Operation::Write,
            Self::SequentialRead | Self::RandomRead => Operation::Read,
        }
    }

    pub fn pattern(self) -> AccessPattern {
        match self {
            Self::SequentialWrite | Self::SequentialRead => AccessPattern::Sequential,
            Self::RandomWrite | Self::RandomRead => AccessPattern::Random,
        }
    }
}

impl Cli {
    /// Convert CLI arguments to a run configuration.
    pub fn into_config(self) -> Result<RunConfig> {
        let block_size = usize::try_from(self.block_size)
            .with_context(|| format!("Block size {} does not fit in memory", self.block_size))?;

        let block_count = match self.file_size {
            Some(file_size) => {
                if block_size == 0 || file_size % self.block_size != 0 {
                    bail!("File size must be a multiple of the block size.");
                }
                file_size / self.block_size
            }
            None => self.blocks.unwrap_or(DEFAULT_BLOCK_COUNT),
        };

        let tag = match self.tag {
            Some(tag) if tag.trim().is_empty() => bail!("Invalid tag."),
            Some(tag) => tag,
            None => "Untitled".to_string(),
        };

        let preallocation = if self.preallocate {
            Preallocation::Zeroed
        } else if self.preallocate_length {
            Preallocation::LengthOnly
        } else {
            Preallocation::None
        };

        let color = self.color || (!self.no_color && supports_color());

        #[cfg(all(target_os = "linux", feature = "io-uring"))]
        let io_uring = self.io_uring;
        #[cfg(not(all(target_os = "linux", feature = "io-uring")))]
        let io_uring = false;

        let mut config = RunConfig::new(self.path);
        config.tag = tag;
        config.operation = self.op.operation();
        config.pattern = self.op.pattern();
        config.block_count = block_count;
        config.block_size = block_size;
        config.asynchronous = self.asynchronous;
        config.max_outstanding = self.max_outstanding;
        config.verify = self.verify;
        config.random_content = self.random_content;
        config.no_buffering = self.no_buffering;
        config.write_through = self.write_through;
        config.disable_local_buffering = self.disable_local_buffering;
        config.enable_prefetch = self.enable_prefetch;
        config.no_hints = self.no_hints;
        config.no_flush = self.no_flush;
        config.preallocation = preallocation;
        config.io_uring = io_uring;
        config.seed = self.seed.unwrap_or_else(clock_seed);
        config.results_file = self.results_file;
        config.json = self.json;
        config.color = color;
        config.verbose = self.verbose;

        Ok(config)
    }
}

fn clock_seed() -> u64 {
    let now = chrono::Utc::now();
    now.timestamp_nanos_opt()
        .map_or_else(|| now.timestamp().unsigned_abs(), i64::unsigned_abs)
}

/// Errors from parsing a human-readable size.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeError {
    #[error("empty size")]
    Empty,
    #[error("invalid number in size '{0}'")]
    InvalidNumber(String),
    #[error("unknown size unit '{0}' (expected B, K, M, G, KiB, MiB, GiB)")]
    UnknownUnit(String),
    #[error("size '{0}' is too large")]
    Overflow(String),
}

/// Parses `4096`, `4K`, `4KB`, `4KiB`, `1M`, `2G` and the like. Units are
/// binary (1K = 1024 bytes) and case-insensitive.
pub fn parse_size(input: &str) -> Result<u64, SizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SizeError::Empty);
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    if digits.is_empty() {
        return Err(SizeError::InvalidNumber(input.to_string()));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| SizeError::Overflow(input.to_string()))?;

    let shift = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        "t" | "tb" | "tib" => 40,
        other => return Err(SizeError::UnknownUnit(other.to_string())),
    };

    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| SizeError::Overflow(input.to_string()))
}

fn parse_size_arg(input: &str) -> Result<u64, String> {
    parse_size(input).map_err(|e| e.to_string())
}

/// Check if the terminal supports colors.
fn supports_color() -> bool {
    // Check NO_COLOR environment variable (https://no-color.org/)
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }

    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: isatty only inspects the descriptor.
        unsafe { libc::isatty(std::io::stdout().as_raw_fd()) != 0 }
    }

    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["iobench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("4K"), Ok(4096));
        assert_eq!(parse_size("4k"), Ok(4096));
        assert_eq!(parse_size("64KiB"), Ok(65536));
        assert_eq!(parse_size("1M"), Ok(1 << 20));
        assert_eq!(parse_size("1MB"), Ok(1 << 20));
        assert_eq!(parse_size("2 GiB"), Ok(2 << 30));
        assert_eq!(parse_size("512b"), Ok(512));
    }

    #[test]
    fn test_parse_size_errors() {
        assert_eq!(parse_size(""), Err(SizeError::Empty));
        assert_eq!(parse_size("   "), Err(SizeError::Empty));
        assert!(matches!(parse_size("K"), Err(SizeError::InvalidNumber(_))));
        assert!(matches!(parse_size("-4K"), Err(SizeError::InvalidNumber(_))));
        assert!(matches!(parse_size("4X"), Err(SizeError::UnknownUnit(_))));
        assert!(matches!(parse_size("1.5M"), Err(SizeError::UnknownUnit(_))));
        assert!(matches!(parse_size("99999999999999999999"), Err(SizeError::Overflow(_))));
        assert!(matches!(parse_size("17179869184T"), Err(SizeError::Overflow(_))));
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["bench.dat", "--no-color"]).into_config().unwrap();
        assert_eq!(config.path, PathBuf::from("bench.dat"));
        assert_eq!(config.operation, Operation::Write);
        assert_eq!(config.pattern, AccessPattern::Sequential);
        assert_eq!(config.block_count, 1024);
        assert_eq!(config.block_size, 1 << 20);
        assert_eq!(config.max_outstanding, 8);
        assert_eq!(config.tag, "Untitled");
        assert_eq!(config.preallocation, Preallocation::None);
        assert!(!config.asynchronous);
        assert!(!config.color);
    }

    #[test]
    fn test_op_codes() {
        for (code, operation, pattern) in [
            ("sw", Operation::Write, AccessPattern::Sequential),
            ("sr", Operation::Read, AccessPattern::Sequential),
            ("rw", Operation::Write, AccessPattern::Random),
            ("rr", Operation::Read, AccessPattern::Random),
            ("rand-read", Operation::Read, AccessPattern::Random),
        ] {
            let cli = parse(&["bench.dat", "--op", code]);
            assert_eq!(cli.op.operation(), operation, "{code}");
            assert_eq!(cli.op.pattern(), pattern, "{code}");
        }
        assert!(Cli::try_parse_from(["iobench", "bench.dat", "--op", "fw"]).is_err());
    }

    #[test]
    fn test_file_size_sets_block_count() {
        let config = parse(&["bench.dat", "-s", "64K", "-f", "4M"])
            .into_config()
            .unwrap();
        assert_eq!(config.block_size, 65536);
        assert_eq!(config.block_count, 64);
    }

    #[test]
    fn test_file_size_must_divide() {
        let err = parse(&["bench.dat", "-s", "64K", "-f", "100K"])
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("multiple of the block size"));
    }

    #[test]
    fn test_blocks_conflict_with_file_size() {
        assert!(Cli::try_parse_from(["iobench", "bench.dat", "-b", "8", "-f", "8M"]).is_err());
    }

    #[test]
    fn test_verify_conflicts_with_random_content() {
        assert!(
            Cli::try_parse_from(["iobench", "bench.dat", "--verify", "--random-content"]).is_err()
        );
    }

    #[test]
    fn test_blank_tag_rejected() {
        let err = parse(&["bench.dat", "--tag", "  "]).into_config().unwrap_err();
        assert_eq!(err.to_string(), "Invalid tag.");
    }

    #[test]
    fn test_flags_reach_config() {
        let config = parse(&[
            "bench.dat",
            "--op",
            "rr",
            "-b",
            "256",
            "-s",
            "8K",
            "--async",
            "-q",
            "32",
            "--verify",
            "--no-buffering",
            "--write-through",
            "--no-hints",
            "--preallocate-length",
            "--seed",
            "42",
            "--tag",
            "nvme",
            "--no-color",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.operation, Operation::Read);
        assert_eq!(config.pattern, AccessPattern::Random);
        assert_eq!(config.block_count, 256);
        assert_eq!(config.block_size, 8192);
        assert!(config.asynchronous);
        assert_eq!(config.max_outstanding, 32);
        assert!(config.verify);
        assert!(config.no_buffering);
        assert!(config.write_through);
        assert!(config.no_hints);
        assert_eq!(config.preallocation, Preallocation::LengthOnly);
        assert_eq!(config.seed, 42);
        assert_eq!(config.tag, "nvme");
    }

    #[test]
    fn test_preallocation_modes_conflict() {
        assert!(
            Cli::try_parse_from(["iobench", "bench.dat", "--preallocate", "--preallocate-length"])
                .is_err()
        );
        let config = parse(&["bench.dat", "--preallocate"]).into_config().unwrap();
        assert_eq!(config.preallocation, Preallocation::Zeroed);
    }
}
