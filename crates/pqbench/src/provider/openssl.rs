//! External-process provider driving the OpenSSL command-line tool.
//!
//! Post-quantum algorithms are served by the OQS provider module, loaded from
//! `provider_path`. Classical algorithms use the default provider.
//!
//! Commands are always spawned with an explicit argv, never through a shell,
//! so every option (padding modes in particular) reaches OpenSSL intact.

use super::{CryptoProvider, Invocation};
use crate::algorithm::Scheme;
use crate::error::ProviderError;
use crate::workspace::{Artifact, Workspace};
use rand::RngCore;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// Length of the random session key RSA key transport encrypts.
const RSA_SESSION_KEY_LEN: usize = 32;

/// First release whose `pkeyutl` has `-encap` and `-decap`.
const KEM_MIN_VERSION: (u32, u32, u32) = (3, 5, 0);

/// Where to find OpenSSL and its provider modules.
#[derive(Debug, Clone)]
pub struct OpenSslSettings {
    pub openssl_path: PathBuf,
    pub provider_path: PathBuf,
}

/// Provider family backed by `openssl` subprocesses.
#[derive(Debug, Clone)]
pub struct OpenSslProvider {
    settings: OpenSslSettings,
}

impl OpenSslProvider {
    pub fn new(settings: OpenSslSettings) -> Self {
        Self { settings }
    }

    fn provider_args(&self, scheme: Scheme) -> Vec<OsString> {
        if scheme != Scheme::PostQuantum {
            return Vec::new();
        }
        vec![
            "-provider-path".into(),
            self.settings.provider_path.clone().into_os_string(),
            "-provider".into(),
            "default".into(),
            "-provider".into(),
            "oqsprovider".into(),
        ]
    }

    /// Argument vectors for key generation: `genpkey` then `pkey -pubout`.
    pub(crate) fn keygen_args(&self, scheme: Scheme, name: &str, ws: &Workspace) -> [Vec<OsString>; 2] {
        let mut genpkey: Vec<OsString> = vec!["genpkey".into()];
        match scheme {
            Scheme::Rsa { bits } => {
                genpkey.extend(args(["-algorithm", "RSA", "-pkeyopt"]));
                genpkey.push(format!("rsa_keygen_bits:{bits}").into());
            }
            Scheme::Ecdh { curve } | Scheme::Ecdsa { curve } => {
                genpkey.extend(args(["-algorithm", "EC", "-pkeyopt"]));
                genpkey.push(format!("ec_paramgen_curve:{}", curve.openssl_name()).into());
            }
            Scheme::PostQuantum => {
                genpkey.extend(args(["-algorithm", name]));
            }
        }
        genpkey.push("-out".into());
        genpkey.push(ws.path(Artifact::PrivateKey).into_os_string());
        genpkey.extend(self.provider_args(scheme));

        let mut pkey: Vec<OsString> = args(["pkey", "-in"]).collect();
        pkey.push(ws.path(Artifact::PrivateKey).into_os_string());
        pkey.push("-pubout".into());
        pkey.push("-out".into());
        pkey.push(ws.path(Artifact::PublicKey).into_os_string());
        pkey.extend(self.provider_args(scheme));

        [genpkey, pkey]
    }

    pub(crate) fn encapsulate_args(&self, scheme: Scheme, ws: &Workspace) -> Vec<OsString> {
        let mut argv: Vec<OsString> = vec!["pkeyutl".into()];
        match scheme {
            Scheme::Ecdh { .. } => {
                argv.extend(args(["-derive", "-inkey"]));
                argv.push(ws.path(Artifact::PrivateKey).into_os_string());
                argv.push("-peerkey".into());
                argv.push(ws.path(Artifact::PublicKey).into_os_string());
                argv.push("-out".into());
                argv.push(ws.path(Artifact::SharedSecret).into_os_string());
            }
            Scheme::Rsa { .. } => {
                argv.extend(args(["-encrypt", "-pubin", "-inkey"]));
                argv.push(ws.path(Artifact::PublicKey).into_os_string());
                argv.push("-in".into());
                argv.push(ws.path(Artifact::SharedSecret).into_os_string());
                argv.push("-out".into());
                argv.push(ws.path(Artifact::Ciphertext).into_os_string());
                argv.extend(oaep_args());
            }
            Scheme::PostQuantum => {
                argv.extend(args(["-encap", "-pubin", "-inkey"]));
                argv.push(ws.path(Artifact::PublicKey).into_os_string());
                argv.push("-out".into());
                argv.push(ws.path(Artifact::Ciphertext).into_os_string());
                argv.push("-secret".into());
                argv.push(ws.path(Artifact::SharedSecret).into_os_string());
            }
            Scheme::Ecdsa { .. } => {}
        }
        argv.extend(self.provider_args(scheme));
        argv
    }

    pub(crate) fn decapsulate_args(&self, scheme: Scheme, ws: &Workspace) -> Vec<OsString> {
        let mut argv: Vec<OsString> = vec!["pkeyutl".into()];
        match scheme {
            Scheme::Rsa { .. } => {
                argv.extend(args(["-decrypt", "-inkey"]));
                argv.push(ws.path(Artifact::PrivateKey).into_os_string());
                argv.push("-in".into());
                argv.push(ws.path(Artifact::Ciphertext).into_os_string());
                argv.push("-out".into());
                argv.push(ws.path(Artifact::RecoveredSecret).into_os_string());
                argv.extend(oaep_args());
            }
            _ => {
                argv.extend(args(["-decap", "-inkey"]));
                argv.push(ws.path(Artifact::PrivateKey).into_os_string());
                argv.push("-in".into());
                argv.push(ws.path(Artifact::Ciphertext).into_os_string());
                argv.push("-secret".into());
                argv.push(ws.path(Artifact::RecoveredSecret).into_os_string());
            }
        }
        argv.extend(self.provider_args(scheme));
        argv
    }

    pub(crate) fn sign_args(&self, scheme: Scheme, ws: &Workspace) -> Vec<OsString> {
        let mut argv: Vec<OsString> = args(["dgst", "-sha256", "-sign"]).collect();
        argv.push(ws.path(Artifact::PrivateKey).into_os_string());
        if matches!(scheme, Scheme::Rsa { .. }) {
            argv.extend(args(["-sigopt", "rsa_padding_mode:pss"]));
        }
        argv.push("-out".into());
        argv.push(ws.path(Artifact::Signature).into_os_string());
        argv.extend(self.provider_args(scheme));
        argv.push(ws.path(Artifact::Message).into_os_string());
        argv
    }

    pub(crate) fn verify_args(&self, scheme: Scheme, ws: &Workspace) -> Vec<OsString> {
        let mut argv: Vec<OsString> = args(["dgst", "-sha256", "-verify"]).collect();
        argv.push(ws.path(Artifact::PublicKey).into_os_string());
        if matches!(scheme, Scheme::Rsa { .. }) {
            argv.extend(args(["-sigopt", "rsa_padding_mode:pss"]));
        }
        argv.push("-signature".into());
        argv.push(ws.path(Artifact::Signature).into_os_string());
        argv.extend(self.provider_args(scheme));
        argv.push(ws.path(Artifact::Message).into_os_string());
        argv
    }

    /// Run one OpenSSL command and return its stdout.
    fn run(&self, argv: &[OsString], trace: bool) -> Result<String, ProviderError> {
        let program = self.settings.openssl_path.display().to_string();
        if trace {
            tracing::debug!("  > COMMAND: {} {}", program, render(argv));
        }

        let output = Command::new(&self.settings.openssl_path)
            .args(argv)
            .output()
            .map_err(|source| ProviderError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.is_empty() {
                stderr = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            Err(ProviderError::Exit {
                program,
                status: output.status,
                stderr,
            })
        }
    }

    fn unsupported(&self, operation: &'static str, inv: &Invocation<'_>) -> ProviderError {
        ProviderError::Unsupported {
            provider: self.name(),
            operation,
            algorithm: inv.name().to_string(),
        }
    }
}

impl CryptoProvider for OpenSslProvider {
    fn name(&self) -> &'static str {
        "openssl"
    }

    fn generate_key(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        let [genpkey, pkey] = self.keygen_args(inv.scheme(), inv.name(), inv.workspace);
        self.run(&genpkey, inv.trace)?;
        self.run(&pkey, inv.trace)?;
        if inv.trace {
            tracing::debug!("  > Key pair for {} generated", inv.name().to_uppercase());
        }
        Ok(())
    }

    fn encapsulate(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        let scheme = inv.scheme();
        if matches!(scheme, Scheme::Ecdsa { .. }) {
            return Err(self.unsupported("encapsulation", inv));
        }
        if matches!(scheme, Scheme::Rsa { .. }) {
            let mut session_key = [0u8; RSA_SESSION_KEY_LEN];
            rand::rng().fill_bytes(&mut session_key);
            inv.workspace.write(Artifact::SharedSecret, session_key)?;
        }
        self.run(&self.encapsulate_args(scheme, inv.workspace), inv.trace)?;
        Ok(())
    }

    fn decapsulate(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        let scheme = inv.scheme();
        if !scheme.has_decapsulation() || matches!(scheme, Scheme::Ecdsa { .. }) {
            return Err(self.unsupported("decapsulation", inv));
        }
        self.run(&self.decapsulate_args(scheme, inv.workspace), inv.trace)?;
        Ok(())
    }

    fn sign(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        if matches!(inv.scheme(), Scheme::Ecdh { .. }) {
            return Err(self.unsupported("signing", inv));
        }
        self.run(&self.sign_args(inv.scheme(), inv.workspace), inv.trace)?;
        Ok(())
    }

    fn verify(&self, inv: &Invocation<'_>) -> Result<bool, ProviderError> {
        if matches!(inv.scheme(), Scheme::Ecdh { .. }) {
            return Err(self.unsupported("verification", inv));
        }
        match self.run(&self.verify_args(inv.scheme(), inv.workspace), inv.trace) {
            Ok(stdout) => Ok(stdout.contains("Verified OK")),
            Err(ProviderError::Exit { stderr, .. }) if stderr.contains("Verification failure") => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn kem_support(&self) -> Result<(), String> {
        let program = self.settings.openssl_path.display();
        let stdout = self
            .run(&[OsString::from("version")], false)
            .map_err(|e| format!("Cannot determine the OpenSSL version: {e}"))?;
        match parse_version(&stdout) {
            Some(version) if version >= KEM_MIN_VERSION => Ok(()),
            Some((major, minor, patch)) => Err(format!(
                "{program} is OpenSSL {major}.{minor}.{patch}; pkeyutl -encap/-decap need 3.5 or newer, \
                 so every post-quantum KEM phase will fail"
            )),
            None => Err(format!(
                "{program} reported an unrecognized version ({}); post-quantum KEM phases may fail",
                stdout.trim()
            )),
        }
    }
}

/// Parse `major.minor.patch` out of `openssl version` output.
///
/// Letter suffixes on the patch level (`1.1.1w`) are ignored.
pub(crate) fn parse_version(output: &str) -> Option<(u32, u32, u32)> {
    let mut tokens = output.split_whitespace();
    tokens.find(|token| *token == "OpenSSL")?;
    let mut parts = tokens.next()?.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(part) => {
            let digits = part.find(|c: char| !c.is_ascii_digit()).unwrap_or(part.len());
            part[..digits].parse().ok()?
        }
        None => 0,
    };
    Some((major, minor, patch))
}

fn args<const N: usize>(items: [&str; N]) -> impl Iterator<Item = OsString> {
    items.into_iter().map(OsString::from)
}

fn oaep_args() -> impl Iterator<Item = OsString> {
    args([
        "-pkeyopt",
        "rsa_padding_mode:oaep",
        "-pkeyopt",
        "rsa_oaep_md:sha256",
    ])
}

fn render(argv: &[OsString]) -> String {
    argv.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Curve;

    fn provider() -> OpenSslProvider {
        OpenSslProvider::new(OpenSslSettings {
            openssl_path: PathBuf::from("/opt/openssl/bin/openssl"),
            provider_path: PathBuf::from("/opt/openssl/lib64/ossl-modules"),
        })
    }

    fn strings(argv: &[OsString]) -> Vec<String> {
        argv.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_rsa_keygen_passes_bits() {
        let ws = Workspace::new("/scratch");
        let [genpkey, pkey] = provider().keygen_args(Scheme::Rsa { bits: 3072 }, "rsa3072", &ws);
        let genpkey = strings(&genpkey);
        assert_eq!(genpkey[0], "genpkey");
        assert!(genpkey.contains(&"rsa_keygen_bits:3072".to_string()));
        assert!(!genpkey.contains(&"oqsprovider".to_string()));
        assert!(strings(&pkey).contains(&"-pubout".to_string()));
    }

    #[test]
    fn test_post_quantum_keygen_loads_oqs_provider() {
        let ws = Workspace::new("/scratch");
        let [genpkey, pkey] = provider().keygen_args(Scheme::PostQuantum, "kyber768", &ws);
        for argv in [strings(&genpkey), strings(&pkey)] {
            let path_pos = argv.iter().position(|a| a == "-provider-path").unwrap();
            let oqs_pos = argv.iter().position(|a| a == "oqsprovider").unwrap();
            assert!(path_pos < oqs_pos, "provider path must precede provider load");
        }
        assert!(strings(&genpkey).contains(&"kyber768".to_string()));
    }

    #[test]
    fn test_rsa_padding_is_explicit() {
        let ws = Workspace::new("/scratch");
        let p = provider();
        let scheme = Scheme::Rsa { bits: 2048 };
        let encap = strings(&p.encapsulate_args(scheme, &ws));
        assert!(encap.contains(&"rsa_padding_mode:oaep".to_string()));
        assert!(encap.contains(&"-pubin".to_string()));
        let decap = strings(&p.decapsulate_args(scheme, &ws));
        assert!(decap.contains(&"rsa_padding_mode:oaep".to_string()));

        let sign = strings(&p.sign_args(scheme, &ws));
        assert!(sign.contains(&"rsa_padding_mode:pss".to_string()));
        assert_eq!(sign.last().unwrap(), "/scratch/message.bin");
    }

    #[test]
    fn test_ecdh_derives_into_shared_secret() {
        let ws = Workspace::new("/scratch");
        let argv = strings(&provider().encapsulate_args(Scheme::Ecdh { curve: Curve::P256 }, &ws));
        assert!(argv.contains(&"-derive".to_string()));
        assert!(argv.contains(&"/scratch/shared_secret.bin".to_string()));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("OpenSSL 3.3.2 3 Sep 2024 (Library: OpenSSL 3.3.2 3 Sep 2024)\n"), Some((3, 3, 2)));
        assert_eq!(parse_version("OpenSSL 3.5.0 8 Apr 2025"), Some((3, 5, 0)));
        assert_eq!(parse_version("OpenSSL 1.1.1w  11 Sep 2023"), Some((1, 1, 1)));
        assert_eq!(parse_version("OpenSSL 3.6"), Some((3, 6, 0)));
        assert_eq!(parse_version("LibreSSL 3.8.2"), None);
        assert_eq!(parse_version("OpenSSL"), None);
        assert_eq!(parse_version(""), None);
        assert!(parse_version("OpenSSL 3.3.2").unwrap() < KEM_MIN_VERSION);
        assert!(parse_version("OpenSSL 3.10.0").unwrap() >= KEM_MIN_VERSION);
    }

    #[test]
    fn test_kem_support_without_binary() {
        let p = OpenSslProvider::new(OpenSslSettings {
            openssl_path: PathBuf::from("/nonexistent/openssl"),
            provider_path: PathBuf::from("/nonexistent"),
        });
        let reason = p.kem_support().unwrap_err();
        assert!(reason.contains("Cannot determine the OpenSSL version"), "{reason}");
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let p = OpenSslProvider::new(OpenSslSettings {
            openssl_path: PathBuf::from("/nonexistent/openssl"),
            provider_path: PathBuf::from("/nonexistent"),
        });
        let temp = tempfile::TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());
        let alg = crate::algorithm::AlgorithmDescriptor::post_quantum("kyber512").unwrap();
        let err = p.generate_key(&Invocation::new(&alg, &ws)).unwrap_err();
        assert!(matches!(err, ProviderError::Spawn { .. }));
    }
}
