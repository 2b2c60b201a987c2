//! Algorithm descriptors and the dispatch vocabulary shared by providers.

use crate::error::ConfigError;
use std::fmt;

/// Which generation of public-key cryptography an algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Classical,
    PostQuantum,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Classical => "classical",
            Self::PostQuantum => "pqc",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named elliptic curves understood by both provider families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    /// NIST P-256, a.k.a. secp256r1 / prime256v1.
    P256,
}

impl Curve {
    /// Curve name as OpenSSL spells it.
    pub fn openssl_name(&self) -> &'static str {
        match self {
            Self::P256 => "prime256v1",
        }
    }
}

impl std::str::FromStr for Curve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "p256" | "p-256" | "prime256v1" | "secp256r1" => Ok(Self::P256),
            _ => Err(format!("Unknown curve: {s}. Valid options: prime256v1 (P-256)")),
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.openssl_name())
    }
}

/// Size parameter of a classical algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyParam {
    /// Modulus length in bits (RSA).
    Bits(u32),
    /// Named curve (ECDSA / ECDH).
    Curve(Curve),
}

impl fmt::Display for KeyParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits(bits) => write!(f, "{bits} bits"),
            Self::Curve(curve) => write!(f, "{curve}"),
        }
    }
}

/// Invocation family: decides which provider call shapes an algorithm uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// RSA key transport (KEM) or RSA-PSS (SIGNATURE).
    Rsa { bits: u32 },
    /// Elliptic-curve Diffie-Hellman; "encapsulation" is a shared-secret derivation.
    Ecdh { curve: Curve },
    /// Elliptic-curve signatures.
    Ecdsa { curve: Curve },
    /// Any algorithm handled by the post-quantum provider module, by name.
    PostQuantum,
}

impl Scheme {
    /// Whether this family can be benchmarked in the given mode.
    pub fn supports(&self, operation: OperationKind) -> bool {
        match self {
            Self::Rsa { .. } | Self::PostQuantum => true,
            Self::Ecdh { .. } => operation == OperationKind::Kem,
            Self::Ecdsa { .. } => operation == OperationKind::Signature,
        }
    }

    /// ECDH derives the shared secret in one step, so there is nothing to decapsulate.
    pub fn has_decapsulation(&self) -> bool {
        !matches!(self, Self::Ecdh { .. })
    }
}

/// Immutable description of one algorithm under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmDescriptor {
    name: String,
    category: Category,
    key_param: Option<KeyParam>,
    scheme: Scheme,
}

impl AlgorithmDescriptor {
    /// Build a descriptor, deriving its invocation family.
    ///
    /// Classical names are matched the way the algorithm groups are written:
    /// anything containing `rsa` needs a bit length, `ecdh`/`ecdsa` need a curve.
    /// Post-quantum algorithms are addressed purely by name and take no size.
    pub fn new(
        name: impl Into<String>,
        category: Category,
        key_param: Option<KeyParam>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        let scheme = derive_scheme(&name, category, key_param)?;
        Ok(Self {
            name,
            category,
            key_param,
            scheme,
        })
    }

    /// RSA descriptor named after its modulus length, e.g. `rsa2048`.
    pub fn rsa(bits: u32) -> Self {
        Self {
            name: format!("rsa{bits}"),
            category: Category::Classical,
            key_param: Some(KeyParam::Bits(bits)),
            scheme: Scheme::Rsa { bits },
        }
    }

    pub fn ecdh(curve: Curve) -> Self {
        Self {
            name: "ecdh".to_string(),
            category: Category::Classical,
            key_param: Some(KeyParam::Curve(curve)),
            scheme: Scheme::Ecdh { curve },
        }
    }

    pub fn ecdsa(curve: Curve) -> Self {
        Self {
            name: "ecdsa".to_string(),
            category: Category::Classical,
            key_param: Some(KeyParam::Curve(curve)),
            scheme: Scheme::Ecdsa { curve },
        }
    }

    pub fn post_quantum(name: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(name, Category::PostQuantum, None)
    }

    /// Post-quantum descriptor for a name known to be valid.
    pub(crate) fn builtin_post_quantum(name: &str) -> Self {
        Self {
            name: name.to_string(),
            category: Category::PostQuantum,
            key_param: None,
            scheme: Scheme::PostQuantum,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn key_param(&self) -> Option<KeyParam> {
        self.key_param
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }
}

impl fmt::Display for AlgorithmDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_param {
            Some(param) => write!(f, "{} ({}, {})", self.name, self.category, param),
            None => write!(f, "{} ({})", self.name, self.category),
        }
    }
}

fn derive_scheme(
    name: &str,
    category: Category,
    key_param: Option<KeyParam>,
) -> Result<Scheme, ConfigError> {
    let unknown = |reason: &str| ConfigError::UnknownScheme {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if category == Category::PostQuantum {
        return match key_param {
            None => Ok(Scheme::PostQuantum),
            Some(_) => Err(unknown("post-quantum algorithms do not take a key parameter")),
        };
    }

    let lower = name.to_lowercase();
    if lower.contains("rsa") {
        match key_param {
            Some(KeyParam::Bits(bits)) if bits >= 1024 => Ok(Scheme::Rsa { bits }),
            Some(KeyParam::Bits(bits)) => Err(unknown(&format!("{bits}-bit RSA keys are too small"))),
            _ => Err(unknown("RSA requires a key size in bits")),
        }
    } else if lower.contains("ecdh") {
        match key_param {
            Some(KeyParam::Curve(curve)) => Ok(Scheme::Ecdh { curve }),
            _ => Err(unknown("ECDH requires a curve")),
        }
    } else if lower.contains("ecdsa") {
        match key_param {
            Some(KeyParam::Curve(curve)) => Ok(Scheme::Ecdsa { curve }),
            _ => Err(unknown("ECDSA requires a curve")),
        }
    } else {
        Err(unknown("classical algorithms must be RSA, ECDH or ECDSA"))
    }
}

/// Benchmark mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Kem,
    Signature,
}

impl OperationKind {
    pub fn all() -> [Self; 2] {
        [Self::Kem, Self::Signature]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Kem => "KEM",
            Self::Signature => "SIGNATURE",
        }
    }

    /// The three timed phases of one iteration, in execution order.
    pub fn phases(&self) -> [Phase; 3] {
        match self {
            Self::Kem => [Phase::KeyGeneration, Phase::Encapsulation, Phase::Decapsulation],
            Self::Signature => [Phase::KeyGeneration, Phase::Signing, Phase::Verification],
        }
    }
}

impl std::str::FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kem" => Ok(Self::Kem),
            "signature" | "sig" => Ok(Self::Signature),
            _ => Err(format!("Unknown operation: {s}. Valid options: kem, signature")),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One timed sub-operation of an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    KeyGeneration,
    Encapsulation,
    Decapsulation,
    Signing,
    Verification,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::KeyGeneration => "key generation",
            Self::Encapsulation => "encapsulation",
            Self::Decapsulation => "decapsulation",
            Self::Signing => "signing",
            Self::Verification => "verification",
        }
    }

    /// Snake-case identifier, used for failure counts in the report.
    pub fn id(&self) -> &'static str {
        match self {
            Self::KeyGeneration => "key_generation",
            Self::Encapsulation => "encapsulation",
            Self::Decapsulation => "decapsulation",
            Self::Signing => "signing",
            Self::Verification => "verification",
        }
    }

    /// Key of this phase's mean in the persisted report.
    pub fn report_key(&self) -> &'static str {
        match self {
            Self::KeyGeneration => "key_generation_avg",
            Self::Encapsulation => "encapsulation_avg",
            Self::Decapsulation => "decapsulation_avg",
            Self::Signing => "signing_avg",
            Self::Verification => "verification_avg",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
