//! Per-algorithm timing loop.
//!
//! One run walks `Init → WarmupKeygen → IterationLoop → Aggregate → Done`.
//! Only the provider call itself is bracketed by the clock; artifact
//! cleanup and the KEM round-trip check happen outside the timed region.

use crate::algorithm::{AlgorithmDescriptor, OperationKind, Phase};
use crate::config::{BenchmarkConfig, LogConfig};
use crate::error::{BenchError, ConfigError, ProviderError, WorkspaceError};
use crate::provider::{CryptoProvider, Invocation, Providers};
use crate::results::{AlgorithmResult, reported_mean};
use crate::workspace::{Artifact, Workspace};
use quanta::Clock;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Stage of a single algorithm run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Init,
    WarmupKeygen,
    IterationLoop,
    Aggregate,
    Done,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::WarmupKeygen => "warmup keygen",
            Self::IterationLoop => "iteration loop",
            Self::Aggregate => "aggregate",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Receives progress of the timed loop.
///
/// Methods take `&self` so implementations can be shared with the runner;
/// use interior mutability for state.
pub trait ProgressSink {
    fn start(&self, _algorithm: &AlgorithmDescriptor, _operation: OperationKind, _iterations: usize) {}

    /// Called after every iteration with the summed duration of its phases.
    fn iteration(&self, _completed: usize, _elapsed: Duration) {}

    fn finish(&self) {}
}

/// Progress sink that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Deterministic payload signed in SIGNATURE mode.
pub fn message_payload(size: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut message = vec![0u8; size];
    rng.fill_bytes(&mut message);
    message
}

/// Raw durations of one phase.
#[derive(Debug, Default)]
struct PhaseSamples {
    durations: Vec<Duration>,
    failures: usize,
}

/// Runs the timing loop for one algorithm at a time.
pub struct TimingHarness<'a> {
    providers: &'a Providers,
    workspace: &'a Workspace,
    clock: Clock,
    iterations: usize,
    message: Vec<u8>,
    log: LogConfig,
    progress: &'a dyn ProgressSink,
}

impl<'a> TimingHarness<'a> {
    pub fn new(providers: &'a Providers, workspace: &'a Workspace, config: &BenchmarkConfig) -> Self {
        Self {
            providers,
            workspace,
            clock: Clock::new(),
            iterations: config.iterations,
            message: message_payload(config.message_size, config.message_seed),
            log: config.log,
            progress: &NoProgress,
        }
    }

    /// Replace the clock, e.g. with `Clock::mock()` in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Benchmark one algorithm in the given mode.
    ///
    /// A key-generation failure (in warmup or in any iteration) aborts the
    /// algorithm with [`BenchError::KeyGenerationFailed`] and leaves no
    /// artifacts behind. Failures of the other two phases are counted and
    /// reported in the result.
    pub fn run(
        &self,
        algorithm: &AlgorithmDescriptor,
        operation: OperationKind,
    ) -> Result<AlgorithmResult, BenchError> {
        let mut state = HarnessState::Init;
        let outcome = self.run_states(algorithm, operation, &mut state);
        if let Err(e) = &outcome {
            tracing::debug!("{} [{}]: aborted in {}: {}", algorithm.name(), operation, state, e);
            // Best effort; the runner resets the workspace before the next algorithm
            if let Err(cleanup) = self
                .workspace
                .cleanup_transient()
                .and_then(|()| self.workspace.cleanup(&[Artifact::Message]))
            {
                tracing::warn!("{}: leftover artifacts after abort: {}", algorithm.name(), cleanup);
            }
        }
        outcome
    }

    fn run_states(
        &self,
        algorithm: &AlgorithmDescriptor,
        operation: OperationKind,
        state: &mut HarnessState,
    ) -> Result<AlgorithmResult, BenchError> {
        let provider = self.providers.for_descriptor(algorithm);
        tracing::debug!("{}: {} [{}]", algorithm.name(), state, operation);
        self.init(algorithm, operation)?;

        transition(state, HarnessState::WarmupKeygen, algorithm);
        let (private_size, public_size) = self.warmup_keygen(provider, algorithm)?;

        transition(state, HarnessState::IterationLoop, algorithm);
        self.progress.start(algorithm, operation, self.iterations);
        let samples = self.iteration_loop(provider, algorithm, operation);
        self.progress.finish();
        let samples = samples?;

        transition(state, HarnessState::Aggregate, algorithm);
        let phases = operation.phases();
        let mut averages = Vec::with_capacity(phases.len());
        let mut failed_phases = BTreeMap::new();
        for (phase, samples) in phases.into_iter().zip(&samples) {
            debug_assert_eq!(samples.durations.len(), self.iterations);
            averages.push((phase, reported_mean(&samples.durations)?));
            if samples.failures > 0 {
                failed_phases.insert(phase, samples.failures);
            }
        }

        transition(state, HarnessState::Done, algorithm);
        self.workspace.cleanup(&[Artifact::Message])?;
        Ok(AlgorithmResult {
            algorithm: algorithm.name().to_string(),
            category: algorithm.category(),
            operation,
            iterations: self.iterations,
            private_size,
            public_size,
            averages,
            failed_phases,
        })
    }

    fn init(&self, algorithm: &AlgorithmDescriptor, operation: OperationKind) -> Result<(), BenchError> {
        if !algorithm.scheme().supports(operation) {
            return Err(ConfigError::UnsupportedOperation {
                name: algorithm.name().to_string(),
                operation,
            }
            .into());
        }
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations.into());
        }

        self.workspace.ensure_exists()?;
        self.workspace.cleanup_transient()?;

        if operation == OperationKind::Signature {
            self.workspace
                .write(Artifact::Message, &self.message)
                .map_err(|e| WorkspaceError::new(self.workspace.path(Artifact::Message), e))?;
        }
        Ok(())
    }

    /// Untimed key generation; the key files give the artifact sizes.
    fn warmup_keygen(
        &self,
        provider: &dyn CryptoProvider,
        algorithm: &AlgorithmDescriptor,
    ) -> Result<(u64, u64), BenchError> {
        let inv = Invocation::new(algorithm, self.workspace);
        provider
            .generate_key(&inv)
            .map_err(|e| keygen_failed(algorithm, &e))?;

        let size = |artifact: Artifact| match self.workspace.size_of(artifact) {
            Ok(0) => Err(BenchError::KeyGenerationFailed {
                algorithm: algorithm.name().to_string(),
                diagnostic: format!("{} is empty", artifact.file_name()),
            }),
            Ok(len) => Ok(len),
            Err(e) => Err(BenchError::KeyGenerationFailed {
                algorithm: algorithm.name().to_string(),
                diagnostic: format!("{} was not produced: {e}", artifact.file_name()),
            }),
        };
        let sizes = (size(Artifact::PrivateKey), size(Artifact::PublicKey));
        self.workspace.cleanup_transient()?;

        let sizes = (sizes.0?, sizes.1?);
        tracing::debug!(
            "{}: private key {} bytes, public key {} bytes",
            algorithm.name(),
            sizes.0,
            sizes.1
        );
        Ok(sizes)
    }

    fn iteration_loop(
        &self,
        provider: &dyn CryptoProvider,
        algorithm: &AlgorithmDescriptor,
        operation: OperationKind,
    ) -> Result<[PhaseSamples; 3], BenchError> {
        let [keygen, first, second] = operation.phases();
        let mut samples: [PhaseSamples; 3] = Default::default();
        let has_second = second != Phase::Decapsulation || algorithm.scheme().has_decapsulation();

        for i in 0..self.iterations {
            let trace = self.log.trace_first_iteration && i == 0;
            if trace {
                tracing::debug!("{}: tracing commands of the first iteration", algorithm.name());
            }
            let inv = Invocation::new(algorithm, self.workspace).traced(trace);

            let (keygen_time, outcome) = self.timed(provider, keygen, &inv);
            if let Err(e) = outcome {
                self.workspace.cleanup_transient()?;
                return Err(keygen_failed(algorithm, &e));
            }
            samples[0].durations.push(keygen_time);

            let (first_time, first_ok) = self.timed_phase(provider, first, &inv, &mut samples[1]);

            let second_time = if has_second {
                let (elapsed, second_ok) = self.timed_phase(provider, second, &inv, &mut samples[2]);
                if operation == OperationKind::Kem
                    && first_ok
                    && second_ok
                    && let Err(diagnostic) = self.check_round_trip()
                {
                    record_failure(algorithm, second, diagnostic, &mut samples[2]);
                }
                elapsed
            } else {
                // Single-step derivation, nothing to decapsulate
                samples[2].durations.push(Duration::ZERO);
                Duration::ZERO
            };

            self.workspace.cleanup_transient()?;
            self.progress.iteration(i + 1, keygen_time + first_time + second_time);
        }

        Ok(samples)
    }

    /// Time one provider call. Verification rejecting the signature is an `Ok(false)`.
    fn timed(
        &self,
        provider: &dyn CryptoProvider,
        phase: Phase,
        inv: &Invocation<'_>,
    ) -> (Duration, Result<bool, ProviderError>) {
        let start = self.clock.now();
        let outcome = match phase {
            Phase::KeyGeneration => provider.generate_key(inv).map(|()| true),
            Phase::Encapsulation => provider.encapsulate(inv).map(|()| true),
            Phase::Decapsulation => provider.decapsulate(inv).map(|()| true),
            Phase::Signing => provider.sign(inv).map(|()| true),
            Phase::Verification => provider.verify(inv),
        };
        let elapsed = self.clock.now().duration_since(start);
        (elapsed, outcome)
    }

    /// Time a non-keygen phase, recording the sample even when it fails.
    fn timed_phase(
        &self,
        provider: &dyn CryptoProvider,
        phase: Phase,
        inv: &Invocation<'_>,
        samples: &mut PhaseSamples,
    ) -> (Duration, bool) {
        let (elapsed, outcome) = self.timed(provider, phase, inv);
        samples.durations.push(elapsed);
        let ok = match outcome {
            Ok(true) => true,
            Ok(false) => {
                record_failure(inv.algorithm, phase, "signature rejected".to_string(), samples);
                false
            }
            Err(e) => {
                record_failure(inv.algorithm, phase, e.to_string(), samples);
                false
            }
        };
        (elapsed, ok)
    }

    /// The recovered secret must equal the one produced by encapsulation.
    fn check_round_trip(&self) -> Result<(), String> {
        let shared = self
            .workspace
            .read(Artifact::SharedSecret)
            .map_err(|e| format!("shared secret unavailable: {e}"))?;
        let recovered = self
            .workspace
            .read(Artifact::RecoveredSecret)
            .map_err(|e| format!("recovered secret unavailable: {e}"))?;
        if shared.is_empty() || shared != recovered {
            return Err("recovered secret does not match the encapsulated one".to_string());
        }
        Ok(())
    }
}

fn transition(state: &mut HarnessState, next: HarnessState, algorithm: &AlgorithmDescriptor) {
    tracing::debug!("{}: {} -> {}", algorithm.name(), state, next);
    *state = next;
}

fn record_failure(
    algorithm: &AlgorithmDescriptor,
    phase: Phase,
    diagnostic: String,
    samples: &mut PhaseSamples,
) {
    samples.failures += 1;
    let err = BenchError::ProviderInvocationFailed {
        algorithm: algorithm.name().to_string(),
        phase,
        diagnostic,
    };
    tracing::warn!("{}", err);
}

fn keygen_failed(algorithm: &AlgorithmDescriptor, err: &ProviderError) -> BenchError {
    BenchError::KeyGenerationFailed {
        algorithm: algorithm.name().to_string(),
        diagnostic: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_payload_is_deterministic() {
        let a = message_payload(1024, 42);
        let b = message_payload(1024, 42);
        assert_eq!(a.len(), 1024);
        assert_eq!(a, b);
        assert_ne!(a, message_payload(1024, 43));
        assert!(message_payload(0, 42).is_empty());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(HarnessState::WarmupKeygen.to_string(), "warmup keygen");
        assert_eq!(HarnessState::Done.to_string(), "done");
    }
}
