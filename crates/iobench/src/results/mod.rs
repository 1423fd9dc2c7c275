//! Results processing and output.
//!
//! - `compute_stats` derives rates from a session snapshot
//! - `ReportPrinter` prints the final report
//! - `append_results` adds one tab-separated line to a results file
//! - `export_json` writes the same report as JSON

// Allow numeric casts for Duration conversions in JSON export
#![allow(clippy::cast_possible_truncation)]

pub mod format;
pub mod printer;
pub mod stats;

pub use format::{format_duration, format_goodput, format_percent, format_size, format_throughput};
pub use printer::ReportPrinter;
pub use stats::{RunStats, Throughput, compute_stats};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::config::RunConfig;
use crate::runner::{RunReport, RunTimings};

/// Column names of the results file, in order.
pub const TSV_HEADER: [&str; 17] = [
    "Tag",
    "Access Pattern",
    "Operation",
    "Blocks",
    "BlockSizeKB",
    "AsyncMax",
    "ReadVerified",
    "Asynch",
    "NoBuffering",
    "WriteThrough",
    "DisableLocalBuffering",
    "Preallocated",
    "ReadWriteFile Time",
    "Wait CompPort Time",
    "Transfer Wall Time",
    "CreateFile Time",
    "Preallocation Time",
];

/// One results-file line for `config` and `timings`. Times are in milliseconds.
pub fn tsv_row(config: &RunConfig, report: &RunReport) -> String {
    let timings: &RunTimings = &report.timings;
    let capitalized = |name: &str| {
        let mut chars = name.chars();
        chars
            .next()
            .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
            .unwrap_or_default()
    };
    let read_verified = match (config.operation.is_read(), config.verify) {
        (true, true) => "Verified",
        (true, false) => "Unverified",
        (false, _) => "N/A",
    };
    let preallocated = if config.operation.is_write() {
        if config.preallocation.is_enabled() { "True" } else { "False" }
    } else {
        "N/A"
    };

    let fields = [
        config.tag.replace('\t', " "),
        capitalized(config.pattern.name()),
        capitalized(config.operation.name()),
        config.block_count.to_string(),
        (config.block_size / 1024).to_string(),
        config.max_outstanding.to_string(),
        read_verified.to_string(),
        if config.asynchronous { "Async" } else { "Sync" }.to_string(),
        if config.no_buffering { "NoBuffering" } else { "Buffering" }.to_string(),
        if config.write_through { "WriteThrough" } else { "NoWriteThrough" }.to_string(),
        if config.disable_local_buffering { "DisableLocalBuffering" } else { "N/A" }.to_string(),
        preallocated.to_string(),
        format::millis(report.snapshot.read_write_time).to_string(),
        format::millis(report.snapshot.completion_wait_time).to_string(),
        format::millis(timings.transfer).to_string(),
        format::millis(timings.create_file).to_string(),
        format::millis(timings.preallocation).to_string(),
    ];
    fields.join("\t")
}

/// Append the result of a finished run to the tab-separated file at `path`,
/// writing the header first when the file is new or empty.
pub fn append_results(config: &RunConfig, report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut text = String::new();
    if file.metadata()?.len() == 0 {
        text.push_str(&TSV_HEADER.join("\t"));
        text.push('\n');
    }
    text.push_str(&tsv_row(config, report));
    text.push('\n');
    file.write_all(text.as_bytes())?;
    Ok(())
}

/// JSON-serializable benchmark report
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub metadata: ReportMetadata,
    pub workload: WorkloadJson,
    pub result: ResultJson,
}

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub platform: String,
    pub iobench_version: String,
    pub tag: String,
}

/// The configuration that produced the result.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadJson {
    pub path: String,
    pub operation: String,
    pub access_pattern: String,
    pub blocks: u64,
    pub block_size: usize,
    pub asynchronous: bool,
    pub max_outstanding: usize,
    pub verify: bool,
    pub random_content: bool,
    /// Content seed (only meaningful with random content)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub no_buffering: bool,
    pub write_through: bool,
    pub disable_local_buffering: bool,
    pub preallocated: bool,
}

/// JSON-serializable counters, timings and rates.
#[derive(Debug, Clone, Serialize)]
pub struct ResultJson {
    pub canceled: bool,
    pub blocks_transferred: u64,
    pub bytes_transferred: u64,
    pub completed_sync: u64,
    pub completed_async: u64,
    pub read_write_time_ns: u64,
    pub completion_wait_time_ns: u64,
    pub transfer_time_ns: u64,
    pub create_file_time_ns: u64,
    pub preallocation_time_ns: u64,
    pub wall_time_ns: u64,
    pub throughput_bytes_per_sec: f64,
    pub throughput_ops_per_sec: f64,
    pub mean_call_time_ns: u64,
}

impl BenchmarkReport {
    /// Build the report for one run.
    pub fn from_run(config: &RunConfig, report: &RunReport) -> Self {
        let stats = compute_stats(&report.snapshot, config, report.timings.transfer);
        let timings = &report.timings;

        Self {
            metadata: ReportMetadata {
                timestamp: chrono::Utc::now().to_rfc3339(),
                platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
                iobench_version: env!("CARGO_PKG_VERSION").to_string(),
                tag: config.tag.clone(),
            },
            workload: WorkloadJson {
                path: config.path.display().to_string(),
                operation: config.operation.to_string(),
                access_pattern: config.pattern.to_string(),
                blocks: config.block_count,
                block_size: config.block_size,
                asynchronous: config.asynchronous,
                max_outstanding: config.max_outstanding,
                verify: config.verify,
                random_content: config.random_content,
                seed: config.random_content.then_some(config.seed),
                no_buffering: config.no_buffering,
                write_through: config.write_through,
                disable_local_buffering: config.disable_local_buffering,
                preallocated: config.operation.is_write() && config.preallocation.is_enabled(),
            },
            result: ResultJson {
                canceled: report.canceled(),
                blocks_transferred: stats.blocks_transferred,
                bytes_transferred: stats.bytes_transferred,
                completed_sync: stats.completed_sync,
                completed_async: stats.completed_async,
                read_write_time_ns: stats.read_write_time.as_nanos() as u64,
                completion_wait_time_ns: stats.completion_wait_time.as_nanos() as u64,
                transfer_time_ns: timings.transfer.as_nanos() as u64,
                create_file_time_ns: timings.create_file.as_nanos() as u64,
                preallocation_time_ns: timings.preallocation.as_nanos() as u64,
                wall_time_ns: timings.wall.as_nanos() as u64,
                throughput_bytes_per_sec: stats.throughput.bytes_per_sec,
                throughput_ops_per_sec: stats.throughput.ops_per_sec,
                mean_call_time_ns: stats.mean_call_time.as_nanos() as u64,
            },
        }
    }
}

/// Export results to JSON file
pub fn export_json(config: &RunConfig, report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let report = BenchmarkReport::from_run(config, report);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use iobench_core::{AccessPattern, Operation, RunOutcome, SessionSnapshot};

    use super::*;
    use crate::config::Preallocation;

    fn report() -> RunReport {
        RunReport {
            outcome: RunOutcome {
                blocks_issued: 64,
                blocks_transferred: 64,
                canceled: false,
            },
            snapshot: SessionSnapshot {
                completed_sync: 4,
                completed_async: 60,
                blocks_transferred: 64,
                read_write_time: Duration::from_micros(2500),
                completion_wait_time: Duration::from_millis(10),
                canceled: false,
            },
            timings: RunTimings {
                create_file: Duration::from_micros(250),
                preallocation: Duration::ZERO,
                transfer: Duration::from_millis(20),
                wall: Duration::from_millis(21),
            },
        }
    }

    fn config() -> RunConfig {
        let mut config = RunConfig::new("bench.dat");
        config.tag = "nvme\tscratch".to_string();
        config.operation = Operation::Read;
        config.pattern = AccessPattern::Random;
        config.block_count = 64;
        config.block_size = 64 * 1024;
        config.asynchronous = true;
        config.verify = true;
        config
    }

    #[test]
    fn test_tsv_row_columns() {
        let row = tsv_row(&config(), &report());
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields.len(), TSV_HEADER.len());
        assert_eq!(
            &fields[..12],
            &[
                "nvme scratch",
                "Random",
                "Read",
                "64",
                "64",
                "8",
                "Verified",
                "Async",
                "Buffering",
                "NoWriteThrough",
                "N/A",
                "N/A",
            ]
        );
        assert_eq!(fields[12], "2.5");
        assert_eq!(fields[13], "10");
        assert_eq!(fields[14], "20");
        assert_eq!(fields[15], "0.25");
        assert_eq!(fields[16], "0");
    }

    #[test]
    fn test_tsv_row_write_flags() {
        let mut config = config();
        config.operation = Operation::Write;
        config.preallocation = Preallocation::Zeroed;
        config.no_buffering = true;
        config.write_through = true;
        let row = tsv_row(&config, &report());
        let fields: Vec<&str> = row.split('\t').collect();
        assert_eq!(fields[2], "Write");
        assert_eq!(fields[6], "N/A");
        assert_eq!(fields[8], "NoBuffering");
        assert_eq!(fields[9], "WriteThrough");
        assert_eq!(fields[11], "True");
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.tsv");

        append_results(&config(), &report(), &path).unwrap();
        append_results(&config(), &report(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Tag\tAccess Pattern\tOperation"));
        assert!(lines[1].starts_with("nvme scratch\t"));
        assert_eq!(lines[1], lines[2]);
    }

    #[test]
    fn test_append_to_empty_file_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.tsv");
        std::fs::write(&path, "").unwrap();

        append_results(&config(), &report(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Tag\t"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_export_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        export_json(&config(), &report(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["metadata"]["iobench_version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["workload"]["operation"], "read");
        assert_eq!(value["workload"]["access_pattern"], "random");
        assert!(value["workload"].get("seed").is_none());
        assert_eq!(value["result"]["blocks_transferred"], 64);
        assert_eq!(value["result"]["bytes_transferred"], 64 * 64 * 1024);
        assert_eq!(value["result"]["transfer_time_ns"], 20_000_000);
        assert_eq!(value["result"]["canceled"], false);
    }
}
