//! Error types for the benchmark harness.
//!
//! The taxonomy separates per-algorithm failures, which the runner logs and
//! skips, from run-level failures, which halt the whole run.

use crate::algorithm::{OperationKind, Phase};
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while benchmarking.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The provider could not produce a key pair. Fatal for the algorithm only.
    #[error("key generation failed for {algorithm}: {diagnostic}")]
    KeyGenerationFailed { algorithm: String, diagnostic: String },

    /// A timed phase failed. The sample is still recorded.
    #[error("{phase} failed for {algorithm}: {diagnostic}")]
    ProviderInvocationFailed {
        algorithm: String,
        phase: Phase,
        diagnostic: String,
    },

    /// The scratch directory cannot be kept clean, so iterations are no longer isolated.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Aggregation was asked for the mean of zero samples.
    #[error("cannot aggregate an empty sample set")]
    EmptySampleSet,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BenchError {
    /// Whether this error must stop the whole run rather than one algorithm.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::Workspace(_) | Self::Config(_) | Self::EmptySampleSet)
    }
}

/// Failure to read or clean the scratch directory.
#[derive(Debug, Error)]
#[error("workspace error at {path}: {source}")]
pub struct WorkspaceError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WorkspaceError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

/// Failure reported by a crypto provider for a single invocation.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("crypto operation failed: {0}")]
    Crypto(String),

    #[error("{provider} provider does not support {operation} for {algorithm}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
        algorithm: String,
    },
}

impl ProviderError {
    pub fn crypto(err: impl std::fmt::Display) -> Self {
        Self::Crypto(err.to_string())
    }
}

/// Invalid configuration, detected before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("algorithm name must not be empty")]
    EmptyName,

    #[error("cannot determine how to run {name}: {reason}")]
    UnknownScheme { name: String, reason: String },

    #[error("{name} does not support {operation} benchmarks")]
    UnsupportedOperation { name: String, operation: OperationKind },

    #[error("{name} is listed twice for {operation}")]
    DuplicateAlgorithm { name: String, operation: OperationKind },

    #[error("iteration count must be at least 1")]
    ZeroIterations,

    #[error("failed to read algorithm file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse algorithm file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("workspace {workspace} would delete {path}; choose a dedicated scratch directory")]
    WorkspaceOverlap { workspace: PathBuf, path: PathBuf },

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T, E = BenchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_split() {
        let keygen = BenchError::KeyGenerationFailed {
            algorithm: "brokenalg".into(),
            diagnostic: "boom".into(),
        };
        assert!(!keygen.is_fatal_for_run());

        let workspace = BenchError::from(WorkspaceError::new(
            "/tmp/x",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        ));
        assert!(workspace.is_fatal_for_run());
        assert!(BenchError::EmptySampleSet.is_fatal_for_run());
    }

    #[test]
    fn test_keygen_message_names_algorithm() {
        let err = BenchError::KeyGenerationFailed {
            algorithm: "kyber512".into(),
            diagnostic: "unknown algorithm".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("kyber512"));
        assert!(msg.contains("unknown algorithm"));
    }
}
