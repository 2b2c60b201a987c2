//! Benchmark execution runner.

use crate::algorithm::{Category, OperationKind};
use crate::bench::TimingHarness;
use crate::config::{AlgorithmPlan, BenchmarkConfig};
use crate::error::BenchError;
use crate::provider::Providers;
use crate::results::{BenchmarkPrinter, BenchmarkReport, LiveProgressReporter};
use crate::workspace::Workspace;
use quanta::Clock;

/// An algorithm that produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAlgorithm {
    pub algorithm: String,
    pub operation: OperationKind,
    pub reason: String,
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: BenchmarkReport,
    /// Algorithms absent from the report, in run order.
    pub skipped: Vec<SkippedAlgorithm>,
    /// Environment problems detected before the first algorithm ran.
    pub warnings: Vec<String>,
}

impl RunOutcome {
    /// Whether every planned algorithm made it into the report.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Benchmark runner that executes the algorithm plan.
///
/// Algorithms run strictly one after another: the scratch directory is a
/// single shared resource, so only one iteration may hold live artifacts
/// at a time. The workspace is reset before the run and after every
/// algorithm.
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
    providers: Providers,
    workspace: Workspace,
    clock: Clock,
    /// Print progress bars and result lines while running.
    interactive: bool,
}

impl BenchmarkRunner {
    /// Create a runner with the providers described by the configuration.
    pub fn new(config: BenchmarkConfig) -> Self {
        let providers = Providers::from_config(&config);
        Self::with_providers(config, providers)
    }

    /// Create a runner with explicit providers.
    pub fn with_providers(config: BenchmarkConfig, providers: Providers) -> Self {
        let workspace = Workspace::new(&config.workspace_dir);
        Self {
            config,
            providers,
            workspace,
            clock: Clock::new(),
            interactive: true,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Disable terminal output (progress bars, result lines, summary).
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run every selected operation kind over the plan.
    ///
    /// Per-algorithm failures are logged and recorded in
    /// [`RunOutcome::skipped`]; the algorithm is absent from the report.
    /// Configuration and workspace failures halt the run.
    pub fn run(&self, plan: &AlgorithmPlan) -> Result<RunOutcome, BenchError> {
        self.config.validate()?;
        plan.validate()?;

        let printer = BenchmarkPrinter::new(self.config.color);
        let progress = if self.interactive {
            LiveProgressReporter::new(self.config.color)
        } else {
            LiveProgressReporter::hidden()
        };
        let harness = TimingHarness::new(&self.providers, &self.workspace, &self.config)
            .with_clock(self.clock.clone())
            .with_progress(&progress);

        let operations = self.config.selected_operations();
        let total: usize = operations.iter().map(|kind| plan.len(*kind)).sum();
        tracing::info!(
            "Running {} algorithms, {} iterations each (classical: {}, pqc: {})",
            total,
            harness.iterations(),
            self.providers.classical_name(),
            self.providers.post_quantum_name()
        );
        if self.interactive {
            printer.print_banner(
                harness.iterations(),
                self.providers.classical_name(),
                self.providers.post_quantum_name(),
                total,
            );
        }

        let warnings = self.preflight(plan, &operations);

        self.workspace.ensure_exists()?;
        self.workspace.reset()?;

        let mut report = BenchmarkReport::new();
        let mut skipped = Vec::new();

        for kind in operations {
            for group in plan.groups(kind) {
                if !group.algorithms.is_empty() {
                    tracing::info!("{} / {}: {} algorithms", kind, group.category, group.algorithms.len());
                }
                for algorithm in &group.algorithms {
                    tracing::debug!("Benchmarking {} [{}]", algorithm, kind);
                    match harness.run(algorithm, kind) {
                        Ok(result) => {
                            if result.has_failures() {
                                tracing::warn!(
                                    "{} [{}] completed with failed phases: {:?}",
                                    algorithm.name(),
                                    kind,
                                    result.failed_phases
                                );
                            }
                            if self.interactive {
                                printer.print_result(&result);
                            }
                            report.insert(result);
                        }
                        Err(e) if e.is_fatal_for_run() => return Err(e),
                        Err(e) => {
                            tracing::error!("Skipping {} [{}]: {}", algorithm.name(), kind, e);
                            if self.interactive {
                                printer.print_skipped(algorithm.name(), &e.to_string());
                            }
                            skipped.push(SkippedAlgorithm {
                                algorithm: algorithm.name().to_string(),
                                operation: kind,
                                reason: e.to_string(),
                            });
                        }
                    }
                    self.workspace.reset()?;
                }
            }
        }

        if self.interactive {
            printer.print_summary(&report);
        }
        tracing::info!("Run finished: {} results, {} skipped", report.len(), skipped.len());

        Ok(RunOutcome {
            report,
            skipped,
            warnings,
        })
    }

    /// Report providers that cannot serve part of the plan. Never fatal.
    fn preflight(&self, plan: &AlgorithmPlan, operations: &[OperationKind]) -> Vec<String> {
        let mut warnings = Vec::new();
        let post_quantum_kems = operations.contains(&OperationKind::Kem)
            && plan
                .groups(OperationKind::Kem)
                .iter()
                .any(|group| group.category == Category::PostQuantum && !group.algorithms.is_empty());
        if post_quantum_kems && let Err(reason) = self.providers.post_quantum_kem_support() {
            tracing::warn!("{}", reason);
            warnings.push(reason);
        }
        warnings
    }
}
