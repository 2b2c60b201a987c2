//! Command-line interface for the benchmark harness.

// Allow CLI-specific patterns
#![allow(clippy::struct_excessive_bools)]

use crate::algorithm::{Category, OperationKind};
use crate::config::{
    AlgorithmPlan, BenchmarkConfig, ClassicalBackend, DEFAULT_MESSAGE_SEED, DEFAULT_MESSAGE_SIZE,
    DEFAULT_OPENSSL_PATH, DEFAULT_PROVIDER_PATH, LogConfig,
};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Wall-clock benchmark harness for classical and post-quantum KEM and signature algorithms.
///
/// Times key generation plus encapsulation/decapsulation (KEM) or
/// signing/verification (SIGNATURE) for every configured algorithm and
/// writes the per-phase averages to a JSON report.
#[derive(Parser, Debug)]
#[command(name = "pqbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of timed iterations per algorithm.
    #[arg(short = 'n', long, default_value = "100")]
    pub iterations: usize,

    /// Operation kinds to benchmark.
    ///
    /// Valid values: kem, signature (or sig). Can be specified multiple times.
    /// Defaults to both.
    #[arg(short = 'o', long = "operation", value_name = "KIND")]
    pub operations: Vec<String>,

    /// TOML file listing the algorithms to benchmark.
    ///
    /// `[kem]` and `[signature]` tables each hold `classical = [...]` and
    /// `pqc = [...]` arrays of `{ name, key }` entries. Replaces the
    /// built-in algorithm lists.
    #[arg(short = 'a', long, value_name = "FILE")]
    pub algorithms: Option<PathBuf>,

    /// Only run classical algorithms.
    #[arg(long, conflicts_with = "pqc_only")]
    pub classical_only: bool,

    /// Only run post-quantum algorithms.
    #[arg(long, conflicts_with = "classical_only")]
    pub pqc_only: bool,

    /// Path to the OpenSSL executable.
    #[arg(long, env = "PQBENCH_OPENSSL", default_value = DEFAULT_OPENSSL_PATH)]
    pub openssl: PathBuf,

    /// Directory containing the post-quantum provider module (oqsprovider).
    #[arg(long, env = "PQBENCH_PROVIDER_PATH", default_value = DEFAULT_PROVIDER_PATH)]
    pub provider_path: PathBuf,

    /// Provider family for classical algorithms.
    ///
    /// Valid values:
    /// - library: in-process RSA / P-256 implementations (default)
    /// - openssl: the OpenSSL executable, like the post-quantum algorithms
    #[arg(long, default_value = "library")]
    pub classical_backend: String,

    /// Scratch directory for keys, ciphertexts and signatures.
    ///
    /// Everything inside it is deleted before the run and between algorithms.
    #[arg(short = 'w', long, default_value = "./tmp")]
    pub workspace: PathBuf,

    /// Size in bytes of the message signed in SIGNATURE mode.
    #[arg(long, default_value_t = DEFAULT_MESSAGE_SIZE)]
    pub message_size: usize,

    /// Seed of the message generator.
    #[arg(long, default_value_t = DEFAULT_MESSAGE_SEED)]
    pub message_seed: u64,

    /// Export results to JSON file.
    #[arg(long, value_name = "PATH", default_value = "results/benchmark_results.json")]
    pub json: PathBuf,

    /// Debug log file (truncated on every run).
    #[arg(long, value_name = "PATH", default_value = "benchmark.log")]
    pub log_file: PathBuf,

    /// Disable the debug log file.
    #[arg(long)]
    pub no_log_file: bool,

    /// Log every provider command of the first iteration of each algorithm.
    #[arg(long)]
    pub trace_first_iteration: bool,

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

impl Cli {
    /// Build the run configuration from the parsed arguments.
    pub fn into_config(&self) -> Result<BenchmarkConfig> {
        let classical_backend: ClassicalBackend = self
            .classical_backend
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let operations = self.parse_operations()?;

        // Check color support (--color forces it on, --no-color forces it off)
        let color = self.color || (!self.no_color && supports_color());

        let config = BenchmarkConfig {
            iterations: self.iterations,
            message_size: self.message_size,
            message_seed: self.message_seed,
            workspace_dir: self.workspace.clone(),
            openssl_path: self.openssl.clone(),
            provider_path: self.provider_path.clone(),
            classical_backend,
            operations,
            color,
            log: LogConfig {
                trace_first_iteration: self.trace_first_iteration,
            },
        };
        config.validate()?;

        // Resetting the workspace must never reach the working tree or our own outputs
        let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
        let mut outputs = vec![self.json.as_path()];
        outputs.extend(self.log_file().map(PathBuf::as_path));
        config.check_workspace_isolation(&cwd, &outputs)?;
        Ok(config)
    }

    /// Load the algorithm plan: the file given with `--algorithms`, else the built-in lists.
    pub fn plan(&self) -> Result<AlgorithmPlan> {
        let plan = match &self.algorithms {
            Some(path) => AlgorithmPlan::load(path)
                .with_context(|| format!("Invalid algorithm file {}", path.display()))?,
            None => AlgorithmPlan::default_plan(),
        };
        Ok(if self.classical_only {
            plan.retain_category(Category::Classical)
        } else if self.pqc_only {
            plan.retain_category(Category::PostQuantum)
        } else {
            plan
        })
    }

    /// Parse operation strings into enum values.
    fn parse_operations(&self) -> Result<Vec<OperationKind>> {
        if self.operations.is_empty() {
            return Ok(OperationKind::all().to_vec());
        }

        let mut kinds = Vec::new();
        for s in &self.operations {
            let kind: OperationKind = match s.parse() {
                Ok(kind) => kind,
                Err(e) => bail!(e),
            };
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// Log file path, unless file logging is disabled.
    pub fn log_file(&self) -> Option<&PathBuf> {
        (!self.no_log_file).then_some(&self.log_file)
    }
}

/// Check if the terminal supports colors.
fn supports_color() -> bool {
    // Check NO_COLOR environment variable (https://no-color.org/)
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    // Check FORCE_COLOR environment variable (common convention)
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }

    std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pqbench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--no-color"]);
        let config = cli.into_config().unwrap();
        assert_eq!(config.iterations, 100);
        assert_eq!(config.message_size, 1024);
        assert_eq!(config.workspace_dir, PathBuf::from("./tmp"));
        assert_eq!(config.classical_backend, ClassicalBackend::Library);
        assert_eq!(config.operations, [OperationKind::Kem, OperationKind::Signature]);
        assert!(!config.color);
        assert!(!config.log.trace_first_iteration);
        assert_eq!(cli.json, PathBuf::from("results/benchmark_results.json"));
        assert_eq!(cli.log_file(), Some(&PathBuf::from("benchmark.log")));
    }

    #[test]
    fn test_operation_parsing() {
        let cli = parse(&["-o", "sig", "-o", "SIGNATURE"]);
        assert_eq!(cli.into_config().unwrap().operations, [OperationKind::Signature]);

        let cli = parse(&["-o", "handshake"]);
        assert!(cli.into_config().is_err());
    }

    #[test]
    fn test_rejects_zero_iterations() {
        assert!(parse(&["-n", "0"]).into_config().is_err());
    }

    #[test]
    fn test_classical_backend() {
        let cli = parse(&["--classical-backend", "openssl", "--trace-first-iteration"]);
        let config = cli.into_config().unwrap();
        assert_eq!(config.classical_backend, ClassicalBackend::OpenSsl);
        assert!(config.log.trace_first_iteration);
        assert!(parse(&["--classical-backend", "gnutls"]).into_config().is_err());
    }

    #[test]
    fn test_category_filters() {
        let plan = parse(&["--pqc-only"]).plan().unwrap();
        assert_eq!(plan.len(OperationKind::Kem), 3);
        let plan = parse(&["--classical-only"]).plan().unwrap();
        assert_eq!(plan.len(OperationKind::Signature), 4);
        assert!(Cli::try_parse_from(["pqbench", "--pqc-only", "--classical-only"]).is_err());
    }

    #[test]
    fn test_no_log_file() {
        assert!(parse(&["--no-log-file"]).log_file().is_none());
    }

    #[test]
    fn test_rejects_workspace_holding_outputs() {
        assert!(parse(&["-w", "."]).into_config().is_err());
        assert!(parse(&["--workspace", ".."]).into_config().is_err());
        assert!(parse(&["--log-file", "tmp/x.log"]).into_config().is_err());
        assert!(parse(&["-w", "results"]).into_config().is_err());

        // Without a log file only the report path matters
        let cli = parse(&["--log-file", "tmp/x.log", "--no-log-file", "--no-color"]);
        cli.into_config().unwrap();
    }
}
