//! iobench - block-level storage I/O benchmark.

// Use mimalloc for reduced allocation latency (enabled by default).
// Disable with `--no-default-features` if debugging allocator issues.
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use iobench::{
    Cli, LiveProgress, ReportPrinter, RunConfig, RunReport, append_results, compute_stats,
    export_json,
};
use iobench_core::{BenchError, SessionState};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const VERIFICATION_HELP: &str = "The data being read is not in the form written by this tool. \
     Write the file with iobench first, without --random-content.";

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging with indicatif integration
    // Respect RUST_LOG if set, otherwise use default based on verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .with(filter)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if is_verification_failure(&e) {
                eprintln!("Help: {VERIFICATION_HELP}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config().context("Failed to create benchmark config")?;
    config.validate()?;

    let printer = ReportPrinter::new(config.color);
    printer.print_banner(&config);

    let session = Arc::new(SessionState::with_content_seed(config.seed));
    install_cancel_handler(&session);

    let progress = LiveProgress::new(&config);
    let report = iobench::run(&config, &session, &progress);
    progress.finish();
    let report = report.context("Benchmark execution failed")?;

    let stats = compute_stats(&report.snapshot, &config, report.timings.transfer);
    printer.print_report(&stats, &report.timings);

    if report.canceled() {
        eprintln!("Benchmark canceled by user.");
        return Ok(());
    }

    write_outputs(&config, &report)
}

fn write_outputs(config: &RunConfig, report: &RunReport) -> Result<()> {
    if let Some(path) = &config.results_file {
        append_results(config, report, path)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        println!("Results appended to: {}", path.display());
    }

    if let Some(path) = &config.json {
        export_json(config, report, path).context("Failed to export JSON")?;
        println!("Results exported to: {}", path.display());
    }

    Ok(())
}

/// Ctrl+C only raises the cancellation flag; the run drains in-flight requests.
fn install_cancel_handler(session: &Arc<SessionState>) {
    let session = Arc::clone(session);
    if let Err(e) = ctrlc::set_handler(move || session.cancel()) {
        tracing::warn!("Failed to install signal handler: {}", e);
    }
}

fn is_verification_failure(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.downcast_ref::<BenchError>().is_some_and(BenchError::is_verification))
}
