//! Live progress display while a transfer is running.
//!
//! Example output:
//! ```text
//!   ⠋ ██████████░░░░░░░░░░  512/1024 blocks  ETA 00:00:04
//!   512.00 MiB of 1.00 GiB (50.0%)   r/w 1.21 s   wait 2.87 s   sync 0 / async 512
//!   goodput 127.9 MiB/s (1073.1 Mbit/s)
//! ```

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use iobench_core::SessionSnapshot;

use crate::config::RunConfig;
use crate::results::format::{format_duration, format_goodput, format_percent, format_size};
use crate::results::stats::{RunStats, compute_stats};

/// How often the runner refreshes the display.
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Progress bar over the blocks of one run.
pub struct LiveProgress {
    progress: ProgressBar,
    config: RunConfig,
}

impl LiveProgress {
    /// Create a progress bar for `config`, drawn on stderr.
    pub fn new(config: &RunConfig) -> Self {
        let progress = ProgressBar::new(config.block_count);
        progress.set_style(style(config.color));
        progress.enable_steady_tick(Duration::from_millis(100));
        Self {
            progress,
            config: config.clone(),
        }
    }

    /// A progress tracker that draws nothing.
    pub fn hidden(config: &RunConfig) -> Self {
        Self {
            progress: ProgressBar::hidden(),
            config: config.clone(),
        }
    }

    /// Refresh from `snapshot` after `elapsed` of transfer. Returns the stats shown.
    pub fn update(&self, snapshot: &SessionSnapshot, elapsed: Duration) -> RunStats {
        let stats = compute_stats(snapshot, &self.config, elapsed);
        self.progress.set_position(stats.blocks_transferred);
        self.progress.set_message(status_message(&stats));
        stats
    }

    /// Remove the bar, leaving the terminal for the final report.
    pub fn finish(&self) {
        self.progress.finish_and_clear();
    }
}

fn style(color: bool) -> ProgressStyle {
    let template = if color {
        "  {spinner:.cyan} {bar:20.cyan/dim}  {pos}/{len} blocks  ETA {eta}\n{msg}"
    } else {
        "  {spinner} {bar:20}  {pos}/{len} blocks  ETA {eta}\n{msg}"
    };
    ProgressStyle::default_bar()
        .template(template)
        .expect("valid template")
        .progress_chars("█▓░")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
}

/// The two status lines under the bar.
pub fn status_message(stats: &RunStats) -> String {
    format!(
        "  {} of {} ({})   r/w {}   wait {}   sync {} / async {}\n  goodput {}",
        format_size(stats.bytes_transferred),
        format_size(stats.bytes_total),
        format_percent(stats.fraction_complete),
        format_duration(stats.read_write_time),
        format_duration(stats.completion_wait_time),
        stats.completed_sync,
        stats.completed_async,
        format_goodput(stats.throughput.bytes_per_sec),
    )
}
