//! Hyperfine-style benchmark result printer.

use crate::algorithm::{OperationKind, Phase};
use crate::results::{AlgorithmResult, BenchmarkReport};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use owo_colors::OwoColorize;
use std::io::Write;
use std::time::Duration;

/// Format a duration as human-readable latency.
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

/// Format a reported average (seconds) as human-readable latency.
pub fn format_secs(secs: f64) -> String {
    if secs <= 0.0 || !secs.is_finite() {
        return "0 ns".to_string();
    }
    format_duration(Duration::from_secs_f64(secs))
}

/// Format a byte count, keeping exact bytes for small artifacts.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    if bytes >= KIB * KIB {
        format!("{:.1} MiB", bytes as f64 / (KIB * KIB) as f64)
    } else if bytes >= 10 * KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats and prints benchmark results in hyperfine style.
pub struct BenchmarkPrinter {
    /// Whether color output is enabled.
    color: bool,
}

impl BenchmarkPrinter {
    /// Create a new printer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Print the run header.
    pub fn print_banner(
        &self,
        iterations: usize,
        classical: &str,
        post_quantum: &str,
        algorithms: usize,
    ) {
        if self.color {
            println!("{}", "pqbench".bold());
            println!(
                "  {} iterations, {} algorithms  (classical: {}, pqc: {})",
                iterations.to_string().cyan(),
                algorithms.to_string().cyan(),
                classical.green(),
                post_quantum.green()
            );
        } else {
            println!("pqbench");
            println!(
                "  {iterations} iterations, {algorithms} algorithms  (classical: {classical}, pqc: {post_quantum})"
            );
        }
        println!();
    }

    /// Print a single algorithm result.
    ///
    /// Example output:
    /// ```text
    ///   Keys:                 private 1704 B    public 451 B
    ///   key generation:       61.02 ms    100 runs
    ///   signing:              1.31 ms
    ///   verification:         72.40 us
    /// ```
    pub fn print_result(&self, result: &AlgorithmResult) {
        let private = format_bytes(result.private_size);
        let public = format_bytes(result.public_size);
        if self.color {
            println!(
                "  {}:{:13}private {}    public {}",
                "Keys".bold(),
                "",
                private.cyan(),
                public.cyan()
            );
        } else {
            println!("  Keys:{:13}private {private}    public {public}", "");
        }

        for (index, (phase, avg)) in result.averages.iter().enumerate() {
            let label = format!("{}:", phase.name());
            let mean = format_secs(*avg);
            let runs = if index == 0 {
                format!("    {} runs", result.iterations)
            } else {
                String::new()
            };
            let failed = result
                .failed_phases
                .get(phase)
                .map(|n| format!("    [{n} failed]"))
                .unwrap_or_default();

            if self.color {
                println!(
                    "  {:<20}{}{}{}",
                    label.bold(),
                    mean.green(),
                    runs.dimmed(),
                    failed.red()
                );
            } else {
                println!("  {label:<20}{mean}{runs}{failed}");
            }
        }
        println!();
    }

    /// Print a notice for an algorithm that produced no result.
    pub fn print_skipped(&self, algorithm: &str, reason: &str) {
        if self.color {
            println!("  {} {} ({})", "Skipped:".yellow().bold(), algorithm, reason.dimmed());
        } else {
            println!("  Skipped: {algorithm} ({reason})");
        }
        println!();
    }

    /// Print one summary table per operation kind that has results.
    pub fn print_summary(&self, report: &BenchmarkReport) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for kind in OperationKind::all() {
            if let Err(e) = render_summary_table(&mut out, kind, report.results(kind), self.color) {
                tracing::warn!("Failed to print {} summary: {}", kind, e);
            }
        }
    }
}

/// Render the summary table for one operation kind.
pub fn render_summary_table<W: Write>(
    writer: &mut W,
    kind: OperationKind,
    results: &[AlgorithmResult],
    color: bool,
) -> std::io::Result<()> {
    if results.is_empty() {
        return Ok(());
    }

    let header = format!(" {kind} ");
    if color {
        writeln!(writer, "\x1b[1;33m{header:=^72}\x1b[0m")?;
    } else {
        writeln!(writer, "{header:=^72}")?;
    }
    writeln!(writer)?;

    let phases = kind.phases();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut head = vec![
        Cell::new("Algorithm").add_attribute(Attribute::Bold),
        Cell::new("Category").add_attribute(Attribute::Bold),
        Cell::new("Private key").add_attribute(Attribute::Bold),
        Cell::new("Public key").add_attribute(Attribute::Bold),
    ];
    head.extend(phases.iter().map(|p| Cell::new(p.name()).add_attribute(Attribute::Bold)));
    table.set_header(head);

    for result in results {
        let mut name = Cell::new(&result.algorithm);
        if color {
            name = name.fg(if result.has_failures() { Color::Red } else { Color::Cyan });
        }
        let mut row = vec![
            name,
            Cell::new(result.category.name()),
            Cell::new(format_bytes(result.private_size)).set_alignment(CellAlignment::Right),
            Cell::new(format_bytes(result.public_size)).set_alignment(CellAlignment::Right),
        ];
        row.extend(phases.iter().map(|phase| phase_cell(result, *phase)));
        table.add_row(row);
    }

    writeln!(writer, "{table}")?;
    writeln!(writer)?;
    Ok(())
}

fn phase_cell(result: &AlgorithmResult, phase: Phase) -> Cell {
    let text = match (result.average(phase), result.failed_phases.get(&phase)) {
        (Some(avg), Some(failed)) => format!("{} ({failed}!)", format_secs(avg)),
        (Some(avg), None) => format_secs(avg),
        (None, _) => "-".to_string(),
    };
    Cell::new(text).set_alignment(CellAlignment::Right)
}
