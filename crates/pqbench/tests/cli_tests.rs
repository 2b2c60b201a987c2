#![allow(deprecated)] // cargo_bin! macro doesn't exist yet in assert_cmd 2.1

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const CLASSICAL_PLAN: &str = r#"
[kem]
classical = [{ name = "ecdh", key = "prime256v1" }]

[signature]
classical = [{ name = "ecdsa", key = "prime256v1" }]
"#;

fn pqbench(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pqbench").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("PQBENCH_OPENSSL")
        .env_remove("PQBENCH_PROVIDER_PATH")
        .arg("--no-color");
    cmd
}

#[test]
fn test_help() {
    let temp = TempDir::new().unwrap();
    pqbench(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--iterations"))
        .stdout(predicate::str::contains("--algorithms"))
        .stdout(predicate::str::contains("--classical-backend"));
}

#[test]
fn test_invalid_algorithm_file() {
    let temp = TempDir::new().unwrap();
    let plan = temp.path().join("algorithms.toml");
    std::fs::write(&plan, "[kem]\nclassical = [{ name = \"rsa\" }]\n").unwrap();

    pqbench(temp.path())
        .arg("--algorithms")
        .arg(&plan)
        .arg("--no-log-file")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid algorithm file"));
}

#[test]
fn test_unknown_operation() {
    let temp = TempDir::new().unwrap();
    pqbench(temp.path())
        .args(["--operation", "handshake", "--no-log-file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown operation: handshake"));
}

#[test]
fn test_classical_run_writes_report() {
    let temp = TempDir::new().unwrap();
    let plan = temp.path().join("algorithms.toml");
    std::fs::write(&plan, CLASSICAL_PLAN).unwrap();
    let json = temp.path().join("out").join("report.json");
    let log = temp.path().join("logs").join("bench.log");
    let scratch = temp.path().join("scratch");

    pqbench(temp.path())
        .arg("--algorithms")
        .arg(&plan)
        .args(["--iterations", "3", "--classical-backend", "library"])
        .arg("--workspace")
        .arg(&scratch)
        .arg("--json")
        .arg(&json)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("Results exported to"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    let ecdh = &report["KEM"]["ecdh"];
    assert!(ecdh["private_size"].as_u64().unwrap() > 0);
    assert_eq!(ecdh["decapsulation_avg"], 0.0);
    let ecdsa = &report["SIGNATURE"]["ecdsa"];
    assert!(ecdsa["signing_avg"].as_f64().unwrap() >= 0.0);
    assert!(ecdsa["verification_avg"].as_f64().unwrap() >= 0.0);

    // Scratch directory is left empty, the debug log is written
    assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    let log_contents = std::fs::read_to_string(&log).unwrap();
    assert!(log_contents.contains("ecdsa"));
}

#[test]
fn test_workspace_overlapping_working_tree_is_rejected() {
    let temp = TempDir::new().unwrap();
    let keep = temp.path().join("notes.txt");
    std::fs::write(&keep, "do not delete").unwrap();

    pqbench(temp.path())
        .args(["--workspace", ".", "--iterations", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dedicated scratch directory"));

    pqbench(temp.path())
        .args(["--log-file", "tmp/x.log", "--iterations", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tmp/x.log"));

    // Nothing was removed and no log file was opened
    assert!(keep.exists());
    assert!(!temp.path().join("tmp").join("x.log").exists());
    assert!(!temp.path().join("benchmark.log").exists());
}
