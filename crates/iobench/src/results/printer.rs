//! Terminal output for a finished run.

use owo_colors::OwoColorize;

use crate::config::{Preallocation, RunConfig};
use crate::results::format::{format_duration, format_goodput, format_percent, format_size};
use crate::results::stats::RunStats;
use crate::runner::RunTimings;

/// Formats and prints the banner and final report.
pub struct ReportPrinter {
    /// Whether color output is enabled.
    color: bool,
}

impl ReportPrinter {
    /// Create a new printer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Print a compact one-line summary of what is about to run.
    ///
    /// Example output:
    /// ```text
    /// iobench: bench.dat - random read, 1024 x 1.00 MiB, async (8 outstanding), verified
    /// ```
    pub fn print_banner(&self, config: &RunConfig) {
        let summary = banner_summary(config);
        let target = config.path.display().to_string();

        println!();
        if self.color {
            println!("{}: {} - {}", "iobench".cyan().bold(), target.bold(), summary);
        } else {
            println!("iobench: {target} - {summary}");
        }
        if config.random_content && config.operation.is_write() {
            println!("  content seed: {}", config.seed);
        }
        println!();
    }

    /// Print the final timings and rates.
    ///
    /// Example output:
    /// ```text
    ///   Size:               1.00 GiB   Blocks:          1024
    ///   Read/Write Time:    1.21 s     Completed Async: 1024
    ///   Completion Wait:    2.87 s     Completed Sync:  0
    ///   Transfer Time:      3.91 s     Avg Goodput:     261.9 MiB/s (2196.8 Mbit/s)
    ///   Open Time:          41.20 us   Percent:         100.0%
    ///   Preallocation Time: 0 ns       Mean Call Time:  1.18 ms
    ///   Wall Time:          3.91 s
    /// ```
    pub fn print_report(&self, stats: &RunStats, timings: &RunTimings) {
        for row in report_rows(stats, timings) {
            let left = self.cell(row.label, &row.value, 20);
            match row.right {
                Some((label, value)) => {
                    let pad = 13usize.saturating_sub(row.value.len());
                    println!("  {left}{:pad$}{}", "", self.cell(label, &value, 17));
                }
                None => println!("  {left}"),
            }
        }
        println!();
    }

    fn cell(&self, label: &str, value: &str, width: usize) -> String {
        let label = format!("{label:<width$}");
        if self.color {
            format!("{}{}", label.bold(), value.cyan())
        } else {
            format!("{label}{value}")
        }
    }
}

/// One line of the final report: a left column and an optional right one.
struct ReportRow {
    label: &'static str,
    value: String,
    right: Option<(&'static str, String)>,
}

impl ReportRow {
    fn new(label: &'static str, value: String, right: Option<(&'static str, String)>) -> Self {
        Self {
            label,
            value,
            right,
        }
    }
}

fn report_rows(stats: &RunStats, timings: &RunTimings) -> Vec<ReportRow> {
    vec![
        ReportRow::new(
            "Size:",
            format_size(stats.bytes_total),
            Some(("Blocks:", stats.blocks_transferred.to_string())),
        ),
        ReportRow::new(
            "Read/Write Time:",
            format_duration(stats.read_write_time),
            Some(("Completed Async:", stats.completed_async.to_string())),
        ),
        ReportRow::new(
            "Completion Wait:",
            format_duration(stats.completion_wait_time),
            Some(("Completed Sync:", stats.completed_sync.to_string())),
        ),
        ReportRow::new(
            "Transfer Time:",
            format_duration(timings.transfer),
            Some(("Avg Goodput:", format_goodput(stats.throughput.bytes_per_sec))),
        ),
        ReportRow::new(
            "Open Time:",
            format_duration(timings.create_file),
            Some(("Percent:", format_percent(stats.fraction_complete))),
        ),
        ReportRow::new(
            "Preallocation Time:",
            format_duration(timings.preallocation),
            Some(("Mean Call Time:", format_duration(stats.mean_call_time))),
        ),
        ReportRow::new("Wall Time:", format_duration(timings.wall), None),
    ]
}

fn banner_summary(config: &RunConfig) -> String {
    let mut parts = vec![
        format!("{} {}", config.pattern, config.operation),
        format!("{} x {}", config.block_count, format_size(config.block_size as u64)),
    ];

    if config.asynchronous {
        let port = if config.io_uring { "io_uring, " } else { "" };
        parts.push(format!("async ({port}{} outstanding)", config.max_outstanding));
    } else {
        parts.push("sync".to_string());
    }
    if config.operation.is_read() && config.verify {
        parts.push("verified".to_string());
    }
    if config.operation.is_write() && config.random_content {
        parts.push("random content".to_string());
    }
    if config.no_buffering {
        parts.push("unbuffered".to_string());
    }
    if config.write_through {
        parts.push("write-through".to_string());
    }
    if config.operation.is_write() {
        match config.preallocation {
            Preallocation::Zeroed => parts.push("preallocated".to_string()),
            Preallocation::LengthOnly => parts.push("preallocated (length only)".to_string()),
            Preallocation::None => {}
        }
    }

    parts.join(", ")
}
