//! Crypto providers: the black boxes the harness times.
//!
//! Every provider exposes the same capability set and moves its inputs and
//! outputs through the [`Workspace`], so in-process and external-process
//! families share one artifact lifecycle:
//!
//! | operation      | reads                          | writes                          |
//! |----------------|--------------------------------|---------------------------------|
//! | `generate_key` |                                | private key, public key         |
//! | `encapsulate`  | public key (+ private for ECDH)| ciphertext, shared secret       |
//! | `decapsulate`  | private key, ciphertext        | recovered secret                |
//! | `sign`         | private key, message           | signature                       |
//! | `verify`       | public key, message, signature |                                 |

mod library;
mod openssl;

pub use library::LibraryProvider;
pub use openssl::{OpenSslProvider, OpenSslSettings};

use crate::algorithm::{AlgorithmDescriptor, Category, Scheme};
use crate::config::{BenchmarkConfig, ClassicalBackend};
use crate::error::ProviderError;
use crate::workspace::Workspace;

/// Everything a provider needs for one call.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub algorithm: &'a AlgorithmDescriptor,
    pub workspace: &'a Workspace,
    /// Log the exact command/operation at debug level.
    pub trace: bool,
}

impl<'a> Invocation<'a> {
    pub fn new(algorithm: &'a AlgorithmDescriptor, workspace: &'a Workspace) -> Self {
        Self {
            algorithm,
            workspace,
            trace: false,
        }
    }

    #[must_use]
    pub fn traced(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn scheme(&self) -> Scheme {
        self.algorithm.scheme()
    }

    pub fn name(&self) -> &str {
        self.algorithm.name()
    }
}

/// Typed capability set implemented once per provider family.
pub trait CryptoProvider {
    /// Short provider name for logs and banners.
    fn name(&self) -> &'static str;

    fn generate_key(&self, inv: &Invocation<'_>) -> Result<(), ProviderError>;

    fn encapsulate(&self, inv: &Invocation<'_>) -> Result<(), ProviderError>;

    fn decapsulate(&self, inv: &Invocation<'_>) -> Result<(), ProviderError>;

    fn sign(&self, inv: &Invocation<'_>) -> Result<(), ProviderError>;

    /// Returns `Ok(false)` when the provider ran but rejected the signature.
    fn verify(&self, inv: &Invocation<'_>) -> Result<bool, ProviderError>;

    /// Checked once before a run that includes post-quantum KEMs.
    ///
    /// `Err` carries a reason why encapsulation and decapsulation are
    /// expected to fail.
    fn kem_support(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Provider families selected by algorithm category.
pub struct Providers {
    classical: Box<dyn CryptoProvider>,
    post_quantum: Box<dyn CryptoProvider>,
}

impl Providers {
    pub fn new(classical: Box<dyn CryptoProvider>, post_quantum: Box<dyn CryptoProvider>) -> Self {
        Self {
            classical,
            post_quantum,
        }
    }

    /// Build the provider pair described by the configuration.
    pub fn from_config(config: &BenchmarkConfig) -> Self {
        let openssl = OpenSslSettings {
            openssl_path: config.openssl_path.clone(),
            provider_path: config.provider_path.clone(),
        };
        let classical: Box<dyn CryptoProvider> = match config.classical_backend {
            ClassicalBackend::Library => Box::new(LibraryProvider::new()),
            ClassicalBackend::OpenSsl => Box::new(OpenSslProvider::new(openssl.clone())),
        };
        Self::new(classical, Box::new(OpenSslProvider::new(openssl)))
    }

    pub fn for_descriptor(&self, algorithm: &AlgorithmDescriptor) -> &dyn CryptoProvider {
        match algorithm.category() {
            Category::Classical => self.classical.as_ref(),
            Category::PostQuantum => self.post_quantum.as_ref(),
        }
    }

    pub fn classical_name(&self) -> &'static str {
        self.classical.name()
    }

    pub fn post_quantum_name(&self) -> &'static str {
        self.post_quantum.name()
    }

    pub fn post_quantum_kem_support(&self) -> Result<(), String> {
        self.post_quantum.kem_support()
    }
}
