//! Configuration types for the benchmark harness.

use crate::algorithm::{AlgorithmDescriptor, Category, Curve, KeyParam, OperationKind};
use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// OpenSSL build the benchmarks were calibrated against.
pub const DEFAULT_OPENSSL_PATH: &str = "/opt/openssl-3.3.2/bin/openssl";
/// Directory holding `oqsprovider.so`.
pub const DEFAULT_PROVIDER_PATH: &str = "/opt/openssl-3.3.2/lib64/ossl-modules";
pub const DEFAULT_ITERATIONS: usize = 100;
/// Size of the signed payload in bytes.
pub const DEFAULT_MESSAGE_SIZE: usize = 1024;
pub const DEFAULT_MESSAGE_SEED: u64 = 0x5eed_ba5e;

/// Provider family used for classical algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassicalBackend {
    /// In-process RustCrypto implementations
    #[default]
    Library,
    /// The same OpenSSL binary the post-quantum algorithms go through
    OpenSsl,
}

impl ClassicalBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::OpenSsl => "openssl",
        }
    }
}

impl std::str::FromStr for ClassicalBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "library" | "lib" | "rustcrypto" => Ok(Self::Library),
            "openssl" => Ok(Self::OpenSsl),
            _ => Err(format!("Unknown classical backend: {s}. Valid options: library, openssl")),
        }
    }
}

impl std::fmt::Display for ClassicalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Logging switches handed to the harness at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Log every provider command of the first iteration of each algorithm.
    pub trace_first_iteration: bool,
}

/// Configuration for running benchmarks.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Timed iterations per algorithm.
    pub iterations: usize,
    /// Size of the SIGNATURE payload in bytes.
    pub message_size: usize,
    /// Seed for the payload generator, so every run signs the same bytes.
    pub message_seed: u64,
    /// Scratch directory for transient artifacts.
    pub workspace_dir: PathBuf,
    /// OpenSSL executable.
    pub openssl_path: PathBuf,
    /// Directory searched for the post-quantum provider module.
    pub provider_path: PathBuf,
    pub classical_backend: ClassicalBackend,
    /// Operation kinds to run, in order.
    pub operations: Vec<OperationKind>,
    /// Enable colored output.
    pub color: bool,
    pub log: LogConfig,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            message_size: DEFAULT_MESSAGE_SIZE,
            message_seed: DEFAULT_MESSAGE_SEED,
            workspace_dir: PathBuf::from("./tmp"),
            openssl_path: PathBuf::from(DEFAULT_OPENSSL_PATH),
            provider_path: PathBuf::from(DEFAULT_PROVIDER_PATH),
            classical_backend: ClassicalBackend::default(),
            operations: OperationKind::all().to_vec(),
            color: true,
            log: LogConfig::default(),
        }
    }
}

impl BenchmarkConfig {
    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.operations.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one operation kind must be selected".to_string(),
            ));
        }
        if self.workspace_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("workspace directory must not be empty".to_string()));
        }
        Ok(())
    }

    /// Reject a workspace that resetting would damage.
    ///
    /// The workspace must not be `cwd` or one of its ancestors, and must not
    /// contain any of the `outputs` (report and log files). Paths are
    /// resolved against `cwd` lexically, without touching the filesystem.
    pub fn check_workspace_isolation(&self, cwd: &Path, outputs: &[&Path]) -> Result<(), ConfigError> {
        let workspace = resolve(cwd, &self.workspace_dir);
        let overlap = |path: &Path| ConfigError::WorkspaceOverlap {
            workspace: self.workspace_dir.clone(),
            path: path.to_path_buf(),
        };

        if resolve(cwd, Path::new(".")).starts_with(&workspace) {
            return Err(overlap(cwd));
        }
        for output in outputs {
            if resolve(cwd, output).starts_with(&workspace) {
                return Err(overlap(output));
            }
        }
        Ok(())
    }

    /// Operation kinds in execution order (KEM before SIGNATURE), deduplicated.
    pub fn selected_operations(&self) -> Vec<OperationKind> {
        OperationKind::all()
            .into_iter()
            .filter(|kind| self.operations.contains(kind))
            .collect()
    }
}

/// Join `path` onto `base` and fold `.` and `..` components.
fn resolve(base: &Path, path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in base.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}

/// Algorithms of one category, in run order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmGroup {
    pub category: Category,
    pub algorithms: Vec<AlgorithmDescriptor>,
}

impl AlgorithmGroup {
    pub fn new(category: Category, algorithms: Vec<AlgorithmDescriptor>) -> Self {
        Self {
            category,
            algorithms,
        }
    }
}

/// Ordered algorithm groups per operation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmPlan {
    kem: Vec<AlgorithmGroup>,
    signature: Vec<AlgorithmGroup>,
}

impl AlgorithmPlan {
    /// Build and validate a plan.
    pub fn new(
        kem: Vec<AlgorithmGroup>,
        signature: Vec<AlgorithmGroup>,
    ) -> Result<Self, ConfigError> {
        let plan = Self { kem, signature };
        plan.validate()?;
        Ok(plan)
    }

    /// Built-in algorithm lists.
    pub fn default_plan() -> Self {
        let pqc = |names: &[&str]| -> Vec<_> {
            names.iter().map(|name| AlgorithmDescriptor::builtin_post_quantum(name)).collect()
        };
        let rsa = [2048, 3072, 4096].map(AlgorithmDescriptor::rsa);

        let mut kem_classical = vec![AlgorithmDescriptor::ecdh(Curve::P256)];
        kem_classical.extend(rsa.clone());
        let mut sig_classical = vec![AlgorithmDescriptor::ecdsa(Curve::P256)];
        sig_classical.extend(rsa);

        let kem_pqc = pqc(&["kyber512", "kyber768", "kyber1024"]);
        let sig_pqc = pqc(&[
            "dilithium2",
            "dilithium3",
            "dilithium5",
            "falcon512",
            "falcon1024",
            "sphincssha2128fsimple",
            "sphincsshake128fsimple",
        ]);

        Self {
            kem: vec![
                AlgorithmGroup::new(Category::Classical, kem_classical),
                AlgorithmGroup::new(Category::PostQuantum, kem_pqc),
            ],
            signature: vec![
                AlgorithmGroup::new(Category::Classical, sig_classical),
                AlgorithmGroup::new(Category::PostQuantum, sig_pqc),
            ],
        }
    }

    /// Load a plan from a TOML algorithm file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    /// Parse a plan from TOML text; `origin` is only used in error messages.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let file: PlanFile = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        let kem = file.kem.map(PlanSection::into_groups).transpose()?.unwrap_or_default();
        let signature = file
            .signature
            .map(PlanSection::into_groups)
            .transpose()?
            .unwrap_or_default();
        if kem.iter().chain(&signature).all(|g| g.algorithms.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "{} does not list any algorithms",
                origin.display()
            )));
        }
        Self::new(kem, signature)
    }

    pub fn groups(&self, kind: OperationKind) -> &[AlgorithmGroup] {
        match kind {
            OperationKind::Kem => &self.kem,
            OperationKind::Signature => &self.signature,
        }
    }

    /// All descriptors of one kind in run order.
    pub fn algorithms(&self, kind: OperationKind) -> impl Iterator<Item = &AlgorithmDescriptor> {
        self.groups(kind).iter().flat_map(|g| g.algorithms.iter())
    }

    pub fn len(&self, kind: OperationKind) -> usize {
        self.algorithms(kind).count()
    }

    /// Keep only classical (or only post-quantum) algorithms.
    #[must_use]
    pub fn retain_category(mut self, category: Category) -> Self {
        self.kem.retain(|g| g.category == category);
        self.signature.retain(|g| g.category == category);
        self
    }

    /// Names must be unique per kind and every scheme must support its kind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in OperationKind::all() {
            let mut seen = HashSet::new();
            for group in self.groups(kind) {
                for algorithm in &group.algorithms {
                    if algorithm.category() != group.category {
                        return Err(ConfigError::Invalid(format!(
                            "{} is {} but listed in the {} group",
                            algorithm.name(),
                            algorithm.category(),
                            group.category
                        )));
                    }
                    if !algorithm.scheme().supports(kind) {
                        return Err(ConfigError::UnsupportedOperation {
                            name: algorithm.name().to_string(),
                            operation: kind,
                        });
                    }
                    if !seen.insert(algorithm.name()) {
                        return Err(ConfigError::DuplicateAlgorithm {
                            name: algorithm.name().to_string(),
                            operation: kind,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for AlgorithmPlan {
    fn default() -> Self {
        Self::default_plan()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanFile {
    kem: Option<PlanSection>,
    signature: Option<PlanSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanSection {
    #[serde(default)]
    classical: Vec<PlanEntry>,
    #[serde(default)]
    pqc: Vec<PlanEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanEntry {
    name: String,
    key: Option<PlanKey>,
}

/// `key = 2048` or `key = "prime256v1"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanKey {
    Bits(u32),
    Curve(String),
}

impl PlanSection {
    fn into_groups(self) -> Result<Vec<AlgorithmGroup>, ConfigError> {
        let convert = |entries: Vec<PlanEntry>, category| {
            entries
                .into_iter()
                .map(|entry| entry.into_descriptor(category))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(vec![
            AlgorithmGroup::new(Category::Classical, convert(self.classical, Category::Classical)?),
            AlgorithmGroup::new(Category::PostQuantum, convert(self.pqc, Category::PostQuantum)?),
        ])
    }
}

impl PlanEntry {
    fn into_descriptor(self, category: Category) -> Result<AlgorithmDescriptor, ConfigError> {
        let key_param = match self.key {
            None => None,
            Some(PlanKey::Bits(bits)) => Some(KeyParam::Bits(bits)),
            Some(PlanKey::Curve(curve)) => {
                let curve = curve.parse::<Curve>().map_err(|reason| ConfigError::UnknownScheme {
                    name: self.name.clone(),
                    reason,
                })?;
                Some(KeyParam::Curve(curve))
            }
        };
        AlgorithmDescriptor::new(self.name, category, key_param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Scheme;

    fn parse(contents: &str) -> Result<AlgorithmPlan, ConfigError> {
        AlgorithmPlan::parse(contents, Path::new("algorithms.toml"))
    }

    #[test]
    fn test_default_plan_order() {
        let plan = AlgorithmPlan::default_plan();
        let kem: Vec<_> = plan.algorithms(OperationKind::Kem).map(AlgorithmDescriptor::name).collect();
        assert_eq!(
            kem,
            ["ecdh", "rsa2048", "rsa3072", "rsa4096", "kyber512", "kyber768", "kyber1024"]
        );
        assert_eq!(plan.len(OperationKind::Signature), 11);
        assert_eq!(plan.groups(OperationKind::Signature)[0].category, Category::Classical);
        plan.validate().unwrap();
    }

    #[test]
    fn test_parse_plan_file() {
        let plan = parse(
            r#"
            [kem]
            classical = [{ name = "ecdh", key = "prime256v1" }, { name = "rsa2048", key = 2048 }]
            pqc = [{ name = "kyber768" }]

            [signature]
            classical = [{ name = "ecdsa", key = "P-256" }]
            "#,
        )
        .unwrap();

        let kem: Vec<_> = plan.algorithms(OperationKind::Kem).collect();
        assert_eq!(kem.len(), 3);
        assert_eq!(kem[1].scheme(), Scheme::Rsa { bits: 2048 });
        assert_eq!(kem[2].category(), Category::PostQuantum);
        assert_eq!(plan.len(OperationKind::Signature), 1);
    }

    #[test]
    fn test_missing_section_is_empty() {
        let plan = parse("[signature]\npqc = [{ name = \"dilithium2\" }]\n").unwrap();
        assert_eq!(plan.len(OperationKind::Kem), 0);
        assert_eq!(plan.len(OperationKind::Signature), 1);
    }

    #[test]
    fn test_rejects_invalid_plans() {
        assert!(matches!(
            parse("[kem]\nclassical = [{ name = \"ecdsa\", key = \"prime256v1\" }]\n"),
            Err(ConfigError::UnsupportedOperation { .. })
        ));
        assert!(matches!(
            parse("[kem]\npqc = [{ name = \"kyber512\" }, { name = \"kyber512\" }]\n"),
            Err(ConfigError::DuplicateAlgorithm { .. })
        ));
        assert!(matches!(
            parse("[kem]\nclassical = [{ name = \"ecdh\", key = \"curve25519\" }]\n"),
            Err(ConfigError::UnknownScheme { .. })
        ));
        assert!(matches!(
            parse("[kem]\nclassical = [{ name = \"rsa2048\" }]\n"),
            Err(ConfigError::UnknownScheme { .. })
        ));
        assert!(matches!(parse("[kem]\nbogus = 1\n"), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse(""), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_same_name_allowed_across_kinds() {
        let plan = parse(
            "[kem]\nclassical = [{ name = \"rsa2048\", key = 2048 }]\n\
             [signature]\nclassical = [{ name = \"rsa2048\", key = 2048 }]\n",
        )
        .unwrap();
        assert_eq!(plan.len(OperationKind::Kem), 1);
        assert_eq!(plan.len(OperationKind::Signature), 1);
    }

    #[test]
    fn test_retain_category() {
        let plan = AlgorithmPlan::default_plan().retain_category(Category::Classical);
        assert_eq!(plan.len(OperationKind::Kem), 4);
        assert!(plan.algorithms(OperationKind::Signature).all(|a| a.category() == Category::Classical));
    }

    #[test]
    fn test_config_validation() {
        let mut config = BenchmarkConfig::default();
        config.validate().unwrap();
        assert_eq!(config.selected_operations(), [OperationKind::Kem, OperationKind::Signature]);

        config.operations = vec![OperationKind::Signature, OperationKind::Signature];
        assert_eq!(config.selected_operations(), [OperationKind::Signature]);

        config.iterations = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroIterations)));

        config.iterations = 1;
        config.operations.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("openssl".parse::<ClassicalBackend>().unwrap(), ClassicalBackend::OpenSsl);
        assert_eq!("Library".parse::<ClassicalBackend>().unwrap(), ClassicalBackend::Library);
        assert!("boringssl".parse::<ClassicalBackend>().is_err());
    }

    #[test]
    fn test_workspace_isolation() {
        let cwd = Path::new("/home/bench/project");
        let json = Path::new("results/benchmark_results.json");
        let log = Path::new("benchmark.log");
        let with_workspace = |dir: &str| BenchmarkConfig {
            workspace_dir: PathBuf::from(dir),
            ..BenchmarkConfig::default()
        };

        with_workspace("./tmp").check_workspace_isolation(cwd, &[json, log]).unwrap();
        with_workspace("/var/tmp/pqbench").check_workspace_isolation(cwd, &[json, log]).unwrap();

        for dir in [".", "./", "..", "/home", "tmp/.."] {
            let err = with_workspace(dir).check_workspace_isolation(cwd, &[json, log]).unwrap_err();
            assert!(matches!(err, ConfigError::WorkspaceOverlap { .. }), "{dir}");
        }

        // Log file inside the default scratch directory
        let err = with_workspace("./tmp")
            .check_workspace_isolation(cwd, &[json, Path::new("tmp/x.log")])
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::WorkspaceOverlap { ref path, .. } if path == Path::new("tmp/x.log"))
        );
        let err = with_workspace("out")
            .check_workspace_isolation(cwd, &[Path::new("/home/bench/project/out/report.json")])
            .unwrap_err();
        assert!(err.to_string().contains("dedicated scratch directory"));

        // A sibling sharing a name prefix is not inside the workspace
        with_workspace("tmp").check_workspace_isolation(cwd, &[Path::new("tmp2/x.log")]).unwrap();
    }
}
