//! Number formatting utilities.

use std::time::Duration;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;
const TIB: f64 = GIB * 1024.0;

/// Format bytes per second as human-readable throughput.
pub fn format_throughput(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= GIB {
        format!("{:.1} GB/s", bytes_per_sec / GIB)
    } else if bytes_per_sec >= MIB {
        format!("{:.1} MB/s", bytes_per_sec / MIB)
    } else if bytes_per_sec >= KIB {
        format!("{:.1} KB/s", bytes_per_sec / KIB)
    } else {
        format!("{bytes_per_sec:.0} B/s")
    }
}

/// Average goodput the way the results are usually compared:
/// binary megabytes and decimal megabits per second.
/// Example: "95.4 MiB/s (800.0 Mbit/s)"
pub fn format_goodput(bytes_per_sec: f64) -> String {
    format!(
        "{:.1} MiB/s ({:.1} Mbit/s)",
        bytes_per_sec / MIB,
        bytes_per_sec * 8.0 / 1_000_000.0
    )
}

/// Format a byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    let b = bytes as f64;
    if b >= TIB {
        format!("{:.2} TiB", b / TIB)
    } else if b >= GIB {
        format!("{:.2} GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.2} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.2} KiB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Format duration as human-readable latency.
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();

    if nanos >= 1_000_000_000 {
        format!("{:.2} s", duration.as_secs_f64())
    } else if nanos >= 1_000_000 {
        format!("{:.2} ms", nanos as f64 / 1_000_000.0)
    } else if nanos >= 1_000 {
        format!("{:.2} us", nanos as f64 / 1_000.0)
    } else {
        format!("{nanos} ns")
    }
}

/// Format a completion fraction (0.0-1.0) as a percentage.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Fractional milliseconds, as written to the results file.
pub fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}
