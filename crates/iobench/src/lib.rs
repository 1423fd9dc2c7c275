//! Block-level storage I/O benchmark.
//!
//! Command-line front end for `iobench-core`: parses and validates a run
//! configuration, opens and optionally preallocates the target, runs one
//! workload with a live progress display, and reports the result.
//!
//! # Usage
//!
//! ```text
//! iobench [OPTIONS] <FILE>
//!
//! Options:
//!   -o, --op <OP>                 sw, sr, rw, rr (default: sw)
//!   -b, --blocks <N>              Number of blocks (default: 1024)
//!   -s, --block-size <SIZE>       Block size, 4K-8M (default: 1M)
//!   -f, --file-size <SIZE>        Total size; sets the block count
//!   -a, --async                   Keep several requests in flight
//!   -q, --max-outstanding <N>     Requests in flight, 1-256 (default: 8)
//!       --verify                  Check read content
//!   -r, --results-file <PATH>     Append a TSV line (or IOBENCH_RESULTS env)
//!   -v, --verbose                 Verbose output
//!   -h, --help                    Print help
//! ```

pub mod cli;
pub mod config;
pub mod progress;
pub mod results;
pub mod runner;

pub use cli::Cli;
pub use config::{Preallocation, RunConfig};
pub use progress::LiveProgress;
pub use results::{ReportPrinter, RunStats, append_results, compute_stats, export_json};
pub use runner::{RunReport, RunTimings, run};
