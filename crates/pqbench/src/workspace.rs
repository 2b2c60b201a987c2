//! Scratch directory holding the transient artifacts of one iteration.
//!
//! Exactly one iteration may hold live artifacts at a time. The harness
//! cleans the per-iteration artifacts after every iteration and the runner
//! resets the whole directory before the run and between algorithms.

use crate::error::WorkspaceError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Files a provider may create in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    PrivateKey,
    PublicKey,
    Ciphertext,
    /// Secret produced by encapsulation (or ECDH derivation).
    SharedSecret,
    /// Secret recovered by decapsulation.
    RecoveredSecret,
    Signature,
    /// Signed payload. Lives for a whole algorithm run, not one iteration.
    Message,
}

impl Artifact {
    /// Artifacts owned by a single iteration.
    pub const TRANSIENT: [Self; 6] = [
        Self::PrivateKey,
        Self::PublicKey,
        Self::Ciphertext,
        Self::SharedSecret,
        Self::RecoveredSecret,
        Self::Signature,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::PrivateKey => "private_key.pem",
            Self::PublicKey => "public_key.pem",
            Self::Ciphertext => "ciphertext.bin",
            Self::SharedSecret => "shared_secret.bin",
            Self::RecoveredSecret => "recovered_secret.bin",
            Self::Signature => "signature.bin",
            Self::Message => "message.bin",
        }
    }
}

/// Owner of the scratch directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an artifact inside the workspace.
    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.root.join(artifact.file_name())
    }

    /// Create the scratch directory if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), WorkspaceError> {
        fs::create_dir_all(&self.root).map_err(|e| WorkspaceError::new(&self.root, e))
    }

    /// Delete every file directly under the scratch directory.
    ///
    /// Subdirectories are left alone; providers never create them.
    /// A missing directory is a no-op. An unreadable directory is an error,
    /// since isolation between iterations can no longer be guaranteed.
    pub fn reset(&self) -> Result<(), WorkspaceError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(WorkspaceError::new(&self.root, e)),
        };

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| WorkspaceError::new(&self.root, e))?;
            let path = entry.path();
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                tracing::debug!("Leaving directory {} in place", path.display());
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(WorkspaceError::new(path, e)),
            }
        }

        if removed > 0 {
            tracing::debug!("Removed {} residual files from {}", removed, self.root.display());
        }
        Ok(())
    }

    /// Delete the named artifacts if present. Missing files are not an error.
    pub fn cleanup(&self, artifacts: &[Artifact]) -> Result<(), WorkspaceError> {
        for artifact in artifacts {
            let path = self.path(*artifact);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(WorkspaceError::new(path, e)),
            }
        }
        Ok(())
    }

    /// Delete all per-iteration artifacts.
    pub fn cleanup_transient(&self) -> Result<(), WorkspaceError> {
        self.cleanup(&Artifact::TRANSIENT)
    }

    pub fn write(&self, artifact: Artifact, contents: impl AsRef<[u8]>) -> io::Result<()> {
        fs::write(self.path(artifact), contents)
    }

    pub fn read(&self, artifact: Artifact) -> io::Result<Vec<u8>> {
        fs::read(self.path(artifact))
    }

    pub fn read_to_string(&self, artifact: Artifact) -> io::Result<String> {
        fs::read_to_string(self.path(artifact))
    }

    /// Size of an artifact in bytes.
    pub fn size_of(&self, artifact: Artifact) -> io::Result<u64> {
        fs::metadata(self.path(artifact)).map(|m| m.len())
    }

    pub fn contains(&self, artifact: Artifact) -> bool {
        self.path(artifact).exists()
    }

    /// Number of entries currently in the scratch directory.
    pub fn file_count(&self) -> Result<usize, WorkspaceError> {
        match fs::read_dir(&self.root) {
            Ok(entries) => Ok(entries.count()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(WorkspaceError::new(&self.root, e)),
        }
    }
}
