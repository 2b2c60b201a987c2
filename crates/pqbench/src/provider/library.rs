//! In-process provider for classical algorithms (RSA, ECDSA/ECDH on P-256).
//!
//! Keys are persisted as PKCS#8 / SPKI PEM in the workspace, exactly like the
//! OpenSSL family does, so artifact sizes are comparable across providers.

use super::{CryptoProvider, Invocation};
use crate::algorithm::{Curve, Scheme};
use crate::error::ProviderError;
use crate::workspace::Artifact;
use p256::ecdsa::signature::{Signer as _, Verifier as _};
use rsa::pkcs8::{
    DecodePrivateKey as _, DecodePublicKey as _, EncodePrivateKey as _, EncodePublicKey as _,
    LineEnding,
};
use rsa::rand_core::{OsRng, RngCore as _};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner as _, SignatureEncoding as _, Verifier as _};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};

/// Length of the random session key RSA key transport encrypts.
const RSA_SESSION_KEY_LEN: usize = 32;

/// Provider family backed by the RustCrypto `rsa` and `p256` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryProvider;

impl LibraryProvider {
    pub fn new() -> Self {
        Self
    }

    fn unsupported(&self, operation: &'static str, inv: &Invocation<'_>) -> ProviderError {
        ProviderError::Unsupported {
            provider: self.name(),
            operation,
            algorithm: inv.name().to_string(),
        }
    }
}

fn rsa_private(inv: &Invocation<'_>) -> Result<RsaPrivateKey, ProviderError> {
    let pem = inv.workspace.read_to_string(Artifact::PrivateKey)?;
    RsaPrivateKey::from_pkcs8_pem(&pem).map_err(ProviderError::crypto)
}

fn rsa_public(inv: &Invocation<'_>) -> Result<RsaPublicKey, ProviderError> {
    let pem = inv.workspace.read_to_string(Artifact::PublicKey)?;
    RsaPublicKey::from_public_key_pem(&pem).map_err(ProviderError::crypto)
}

fn ec_secret(inv: &Invocation<'_>) -> Result<p256::SecretKey, ProviderError> {
    let pem = inv.workspace.read_to_string(Artifact::PrivateKey)?;
    p256::SecretKey::from_pkcs8_pem(&pem).map_err(ProviderError::crypto)
}

fn ec_public(inv: &Invocation<'_>) -> Result<p256::PublicKey, ProviderError> {
    let pem = inv.workspace.read_to_string(Artifact::PublicKey)?;
    p256::PublicKey::from_public_key_pem(&pem).map_err(ProviderError::crypto)
}

impl CryptoProvider for LibraryProvider {
    fn name(&self) -> &'static str {
        "library"
    }

    fn generate_key(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        let ws = inv.workspace;
        match inv.scheme() {
            Scheme::Rsa { bits } => {
                let private = RsaPrivateKey::new(&mut OsRng, bits as usize).map_err(ProviderError::crypto)?;
                let public = RsaPublicKey::from(&private);
                let private_pem = private.to_pkcs8_pem(LineEnding::LF).map_err(ProviderError::crypto)?;
                let public_pem = public
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(ProviderError::crypto)?;
                ws.write(Artifact::PrivateKey, private_pem.as_bytes())?;
                ws.write(Artifact::PublicKey, public_pem)?;
            }
            Scheme::Ecdh { curve: Curve::P256 } | Scheme::Ecdsa { curve: Curve::P256 } => {
                let secret = p256::SecretKey::random(&mut OsRng);
                let private_pem = secret.to_pkcs8_pem(LineEnding::LF).map_err(ProviderError::crypto)?;
                let public_pem = secret
                    .public_key()
                    .to_public_key_pem(LineEnding::LF)
                    .map_err(ProviderError::crypto)?;
                ws.write(Artifact::PrivateKey, private_pem.as_bytes())?;
                ws.write(Artifact::PublicKey, public_pem)?;
            }
            Scheme::PostQuantum => return Err(self.unsupported("key generation", inv)),
        }
        if inv.trace {
            tracing::debug!("  > Key pair for {} generated in-process", inv.name().to_uppercase());
        }
        Ok(())
    }

    fn encapsulate(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        let ws = inv.workspace;
        match inv.scheme() {
            Scheme::Rsa { .. } => {
                let public = rsa_public(inv)?;
                let mut session_key = [0u8; RSA_SESSION_KEY_LEN];
                OsRng.fill_bytes(&mut session_key);
                let ciphertext = public
                    .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &session_key)
                    .map_err(ProviderError::crypto)?;
                ws.write(Artifact::SharedSecret, session_key)?;
                ws.write(Artifact::Ciphertext, ciphertext)?;
            }
            Scheme::Ecdh { .. } => {
                // Peer key is our own public key, as in a loopback exchange
                let secret = ec_secret(inv)?;
                let peer = ec_public(inv)?;
                let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                ws.write(Artifact::SharedSecret, shared.raw_secret_bytes())?;
            }
            Scheme::Ecdsa { .. } | Scheme::PostQuantum => {
                return Err(self.unsupported("encapsulation", inv));
            }
        }
        Ok(())
    }

    fn decapsulate(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        match inv.scheme() {
            Scheme::Rsa { .. } => {
                let private = rsa_private(inv)?;
                let ciphertext = inv.workspace.read(Artifact::Ciphertext)?;
                let recovered = private
                    .decrypt(Oaep::new::<Sha256>(), &ciphertext)
                    .map_err(ProviderError::crypto)?;
                inv.workspace.write(Artifact::RecoveredSecret, recovered)?;
                Ok(())
            }
            _ => Err(self.unsupported("decapsulation", inv)),
        }
    }

    fn sign(&self, inv: &Invocation<'_>) -> Result<(), ProviderError> {
        let ws = inv.workspace;
        let message = ws.read(Artifact::Message)?;
        let signature = match inv.scheme() {
            Scheme::Rsa { .. } => {
                let signing_key = rsa::pss::BlindedSigningKey::<Sha256>::new(rsa_private(inv)?);
                signing_key
                    .try_sign_with_rng(&mut OsRng, &message)
                    .map_err(ProviderError::crypto)?
                    .to_vec()
            }
            Scheme::Ecdsa { .. } => {
                let signing_key = p256::ecdsa::SigningKey::from(ec_secret(inv)?);
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(&message).map_err(ProviderError::crypto)?;
                signature.to_der().as_bytes().to_vec()
            }
            Scheme::Ecdh { .. } | Scheme::PostQuantum => {
                return Err(self.unsupported("signing", inv));
            }
        };
        ws.write(Artifact::Signature, signature)?;
        Ok(())
    }

    fn verify(&self, inv: &Invocation<'_>) -> Result<bool, ProviderError> {
        let ws = inv.workspace;
        let message = ws.read(Artifact::Message)?;
        let signature = ws.read(Artifact::Signature)?;
        match inv.scheme() {
            Scheme::Rsa { .. } => {
                let verifying_key = rsa::pss::VerifyingKey::<Sha256>::new(rsa_public(inv)?);
                let Ok(signature) = rsa::pss::Signature::try_from(signature.as_slice()) else {
                    return Ok(false);
                };
                Ok(verifying_key.verify(&message, &signature).is_ok())
            }
            Scheme::Ecdsa { .. } => {
                let verifying_key = p256::ecdsa::VerifyingKey::from(&ec_public(inv)?);
                let Ok(signature) = p256::ecdsa::Signature::from_der(&signature) else {
                    return Ok(false);
                };
                Ok(verifying_key.verify(&message, &signature).is_ok())
            }
            Scheme::Ecdh { .. } | Scheme::PostQuantum => Err(self.unsupported("verification", inv)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::AlgorithmDescriptor;
    use crate::workspace::Workspace;
    use tempfile::TempDir;

    #[test]
    fn test_post_quantum_is_unsupported() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());
        let alg = AlgorithmDescriptor::post_quantum("dilithium2").unwrap();
        let err = LibraryProvider::new()
            .generate_key(&Invocation::new(&alg, &ws))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported { .. }));
        assert_eq!(ws.file_count().unwrap(), 0);
    }

    #[test]
    fn test_ecdsa_rejects_tampered_message() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());
        let alg = AlgorithmDescriptor::ecdsa(Curve::P256);
        let inv = Invocation::new(&alg, &ws);
        let provider = LibraryProvider::new();

        ws.write(Artifact::Message, b"original message").unwrap();
        provider.generate_key(&inv).unwrap();
        provider.sign(&inv).unwrap();
        assert!(provider.verify(&inv).unwrap());

        ws.write(Artifact::Message, b"tampered message").unwrap();
        assert!(!provider.verify(&inv).unwrap());
    }

    #[test]
    fn test_missing_key_is_io_error() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());
        let alg = AlgorithmDescriptor::ecdh(Curve::P256);
        let err = LibraryProvider::new()
            .encapsulate(&Invocation::new(&alg, &ws))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Io(_)));
    }
}
