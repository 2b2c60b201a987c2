//! Benchmark execution: the per-algorithm timing harness and the run orchestrator.

mod harness;
mod runner;

pub use harness::{HarnessState, NoProgress, ProgressSink, TimingHarness, message_payload};
pub use runner::{BenchmarkRunner, RunOutcome, SkippedAlgorithm};
