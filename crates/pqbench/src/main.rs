//! pqbench - Wall-clock benchmark harness for classical and post-quantum algorithms.

// Use mimalloc for reduced allocation latency (enabled by default).
// Disable with `--no-default-features` if debugging allocator issues.
#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use pqbench::{BenchmarkRunner, Cli, export_json};
use std::fs::File;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Validate before the log file is created
    let config = cli.into_config().context("Failed to create benchmark config")?;

    // The guard flushes the debug log on drop; keep it alive until exit.
    let _log_guard = init_logging(&cli)?;

    let plan = cli.plan()?;

    let runner = BenchmarkRunner::new(config);

    // Results are printed during execution in hyperfine style
    let outcome = runner.run(&plan).context("Benchmark execution failed")?;

    if !outcome.is_complete() {
        let names = outcome
            .skipped
            .iter()
            .map(|s| format!("{} [{}]", s.algorithm, s.operation))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!("{} algorithms produced no result: {}", outcome.skipped.len(), names);
    }

    export_json(&outcome.report, &cli.json).context("Failed to export JSON")?;
    println!("Results exported to: {}", cli.json.display());

    // Brief delay to allow background threads (indicatif tick threads, tracing layer)
    // to terminate cleanly.
    std::thread::sleep(std::time::Duration::from_millis(100));

    Ok(())
}

/// Set up terminal logging with indicatif integration, plus the debug log file.
///
/// Terminal output respects `RUST_LOG`, otherwise defaults to `info` with
/// `--verbose` and `warn` without. The log file always records at debug level.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });

    let (file_layer, guard) = match cli.log_file() {
        Some(path) => {
            let file = create_log_file(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(EnvFilter::new("debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Log messages appear above progress bars without clobbering them
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(indicatif_layer.get_stderr_writer())
                .with_filter(filter),
        )
        .with(indicatif_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Create (truncating) the log file and its parent directory.
fn create_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("Failed to create log file {}", path.display()))
}
