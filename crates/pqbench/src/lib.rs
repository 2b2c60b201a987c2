//! Wall-clock benchmark harness for classical and post-quantum cryptography.
//!
//! Measures how long key-encapsulation (KEM) and digital-signature algorithms
//! take per phase, averaged over a configurable number of iterations:
//!
//! - **KEM**: key generation, encapsulation, decapsulation
//! - **SIGNATURE**: key generation, signing, verification
//!
//! Post-quantum algorithms (Kyber, Dilithium, Falcon, SPHINCS+) run through the
//! OpenSSL executable with the oqsprovider module loaded. Classical algorithms
//! (RSA, ECDH/ECDSA on P-256) run in-process by default, or through OpenSSL.
//! Key, ciphertext and signature artifacts live as files in a scratch
//! workspace that is emptied between algorithms.
//!
//! # Usage
//!
//! ```text
//! pqbench [OPTIONS]
//!
//! Options:
//!   -n, --iterations <N>            Timed iterations per algorithm (default: 100)
//!   -o, --operation <KIND>          kem, signature (repeatable; default: both)
//!   -a, --algorithms <FILE>         TOML algorithm list (default: built-in)
//!       --classical-only            Only classical algorithms
//!       --pqc-only                  Only post-quantum algorithms
//!       --openssl <PATH>            OpenSSL executable (or PQBENCH_OPENSSL env)
//!       --provider-path <DIR>       oqsprovider directory (or PQBENCH_PROVIDER_PATH env)
//!       --classical-backend <NAME>  library, openssl (default: library)
//!   -w, --workspace <DIR>           Scratch directory (default: ./tmp)
//!       --json <PATH>               Report file (default: results/benchmark_results.json)
//!       --log-file <PATH>           Debug log (default: benchmark.log)
//!   -v, --verbose                   Verbose output
//! ```

pub mod algorithm;
pub mod bench;
pub mod cli;
pub mod config;
pub mod error;
pub mod provider;
pub mod results;
pub mod workspace;

pub use algorithm::{AlgorithmDescriptor, Category, OperationKind, Phase};
pub use bench::{BenchmarkRunner, RunOutcome, TimingHarness};
pub use cli::Cli;
pub use config::{AlgorithmPlan, BenchmarkConfig, ClassicalBackend, LogConfig};
pub use error::BenchError;
pub use provider::{CryptoProvider, Providers};
pub use results::{AlgorithmResult, BenchmarkReport, export_json};
pub use workspace::Workspace;
