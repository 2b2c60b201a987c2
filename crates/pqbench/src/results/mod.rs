//! Results processing and visualization.
//!
//! - [`AlgorithmResult`] / [`BenchmarkReport`]: the persisted artifact
//! - `LiveProgressReporter` for real-time progress during execution
//! - `BenchmarkPrinter` for hyperfine-style result output

pub mod printer;
pub mod progress;
pub mod stats;

pub use printer::BenchmarkPrinter;
pub use progress::LiveProgressReporter;
pub use stats::{aggregate, reported_mean, round_secs};

use crate::algorithm::{Category, OperationKind, Phase};
use anyhow::Context;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Summary of one algorithm run.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmResult {
    pub algorithm: String,
    pub category: Category,
    pub operation: OperationKind,
    /// Timed iterations folded into each average.
    pub iterations: usize,
    /// Size of the private key file in bytes.
    pub private_size: u64,
    /// Size of the public key file in bytes.
    pub public_size: u64,
    /// Mean seconds per phase, in execution order.
    pub averages: Vec<(Phase, f64)>,
    /// Phases that failed at least once, with the number of failed iterations.
    pub failed_phases: BTreeMap<Phase, usize>,
}

impl AlgorithmResult {
    pub fn average(&self, phase: Phase) -> Option<f64> {
        self.averages.iter().find(|(p, _)| *p == phase).map(|(_, avg)| *avg)
    }

    /// Whether any phase failed during the run.
    pub fn has_failures(&self) -> bool {
        !self.failed_phases.is_empty()
    }
}

impl Serialize for AlgorithmResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let failed = usize::from(self.has_failures());
        let mut map = serializer.serialize_map(Some(2 + self.averages.len() + failed))?;
        map.serialize_entry("private_size", &self.private_size)?;
        map.serialize_entry("public_size", &self.public_size)?;
        for (phase, avg) in &self.averages {
            map.serialize_entry(phase.report_key(), avg)?;
        }
        if self.has_failures() {
            let counts: BTreeMap<&str, usize> =
                self.failed_phases.iter().map(|(phase, n)| (phase.id(), *n)).collect();
            map.serialize_entry("failed_phases", &counts)?;
        }
        map.end()
    }
}

/// Every algorithm result of a run, keyed by operation kind.
///
/// Entries keep run order. An algorithm that could not be benchmarked is
/// absent rather than present with empty values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkReport {
    kem: Vec<AlgorithmResult>,
    signature: Vec<AlgorithmResult>,
}

impl BenchmarkReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result under its operation kind, replacing one with the same name.
    pub fn insert(&mut self, result: AlgorithmResult) {
        let section = self.section_mut(result.operation);
        match section.iter_mut().find(|r| r.algorithm == result.algorithm) {
            Some(existing) => *existing = result,
            None => section.push(result),
        }
    }

    pub fn results(&self, kind: OperationKind) -> &[AlgorithmResult] {
        match kind {
            OperationKind::Kem => &self.kem,
            OperationKind::Signature => &self.signature,
        }
    }

    pub fn get(&self, kind: OperationKind, algorithm: &str) -> Option<&AlgorithmResult> {
        self.results(kind).iter().find(|r| r.algorithm == algorithm)
    }

    pub fn contains(&self, kind: OperationKind, algorithm: &str) -> bool {
        self.get(kind, algorithm).is_some()
    }

    pub fn len(&self) -> usize {
        self.kem.len() + self.signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any recorded algorithm had failed phases.
    pub fn has_failures(&self) -> bool {
        self.kem.iter().chain(&self.signature).any(AlgorithmResult::has_failures)
    }

    fn section_mut(&mut self, kind: OperationKind) -> &mut Vec<AlgorithmResult> {
        match kind {
            OperationKind::Kem => &mut self.kem,
            OperationKind::Signature => &mut self.signature,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One operation kind, serialized as `name -> result` in run order.
struct Section<'a>(&'a [AlgorithmResult]);

impl Serialize for Section<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in self.0 {
            map.serialize_entry(&result.algorithm, result)?;
        }
        map.end()
    }
}

impl Serialize for BenchmarkReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        for kind in OperationKind::all() {
            map.serialize_entry(kind.name(), &Section(self.results(kind)))?;
        }
        map.end()
    }
}

/// Export the report to a JSON file, creating parent directories.
pub fn export_json(report: &BenchmarkReport, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = report.to_json_pretty()?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(name: &str, operation: OperationKind) -> AlgorithmResult {
        let averages = operation
            .phases()
            .into_iter()
            .zip([0.05, 0.001, 0.002])
            .collect();
        AlgorithmResult {
            algorithm: name.to_string(),
            category: Category::Classical,
            operation,
            iterations: 5,
            private_size: 1704,
            public_size: 451,
            averages,
            failed_phases: BTreeMap::new(),
        }
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = BenchmarkReport::new();
        report.insert(sample_result("rsa2048", OperationKind::Signature));
        report.insert(sample_result("ecdh", OperationKind::Kem));

        let value: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        let rsa = &value["SIGNATURE"]["rsa2048"];
        assert_eq!(rsa["private_size"], 1704);
        assert_eq!(rsa["public_size"], 451);
        assert_eq!(rsa["signing_avg"], 0.001);
        assert!(rsa.get("failed_phases").is_none());
        assert_eq!(value["KEM"]["ecdh"]["decapsulation_avg"], 0.002);
    }

    #[test]
    fn test_empty_sections_are_present() {
        let json = BenchmarkReport::new().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["KEM"].as_object().unwrap().is_empty());
        assert!(value["SIGNATURE"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_failed_phases_serialized() {
        let mut result = sample_result("kyber512", OperationKind::Kem);
        result.failed_phases.insert(Phase::Decapsulation, 3);
        assert!(result.has_failures());

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["failed_phases"]["decapsulation"], 3);
    }

    #[test]
    fn test_entries_keep_run_order() {
        let mut report = BenchmarkReport::new();
        for name in ["rsa4096", "ecdh", "kyber512"] {
            report.insert(sample_result(name, OperationKind::Kem));
        }
        let json = report.to_json_pretty().unwrap();
        let rsa = json.find("rsa4096").unwrap();
        let ecdh = json.find("\"ecdh\"").unwrap();
        let kyber = json.find("kyber512").unwrap();
        assert!(rsa < ecdh && ecdh < kyber);
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut report = BenchmarkReport::new();
        report.insert(sample_result("rsa2048", OperationKind::Kem));
        let mut updated = sample_result("rsa2048", OperationKind::Kem);
        updated.private_size = 1;
        report.insert(updated);
        assert_eq!(report.len(), 1);
        assert_eq!(report.get(OperationKind::Kem, "rsa2048").unwrap().private_size, 1);
        assert!(!report.contains(OperationKind::Signature, "rsa2048"));
    }

    #[test]
    fn test_export_creates_parent_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("results").join("benchmark_results.json");
        let mut report = BenchmarkReport::new();
        report.insert(sample_result("ecdsa", OperationKind::Signature));
        export_json(&report, &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"ecdsa\""));
    }
}
