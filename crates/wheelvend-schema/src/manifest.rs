//! The generated installer manifest.
//!
//! This is the durable contract between the build-time generator and the
//! runtime installer. It is data only; the install routine is the fixed
//! code in `wheelvend-runtime`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::{MatrixError, PlatformMatrix};
use crate::name::is_safe_name;
use crate::MANIFEST_FORMAT_VERSION;

/// Errors raised while reading or validating a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The manifest is not valid JSON for this layout.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The manifest was written by an incompatible generator.
    #[error("Unsupported installer format {found}, expected {expected}")]
    Format {
        /// Version found in the file.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// A name in the manifest is not path-safe.
    #[error("Invalid name in installer manifest: '{0}'")]
    UnsafeName(String),

    /// The manifest lists no modules.
    #[error("Installer manifest lists no modules")]
    NoModules,

    /// The embedded matrix is unusable.
    #[error("Invalid matrix in installer manifest: {0}")]
    Matrix(#[from] MatrixError),
}

/// Everything the runtime installer needs to know about a vendored bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerManifest {
    /// Layout version, see [`MANIFEST_FORMAT_VERSION`].
    pub format_version: u32,
    /// Name of the vendored bundle (the requirements file's directory).
    pub name: String,
    /// Short stable hash of the normalized requirements input.
    pub resolution_hash: String,
    /// Vendored module directories, in requirement order.
    pub modules: Vec<String>,
    /// The matrix the bundle was resolved for.
    pub matrix: PlatformMatrix,
}

impl InstallerManifest {
    /// Create a manifest with the current format version.
    pub fn new(
        name: impl Into<String>,
        resolution_hash: impl Into<String>,
        modules: Vec<String>,
        matrix: PlatformMatrix,
    ) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            name: name.into(),
            resolution_hash: resolution_hash.into(),
            modules,
            matrix,
        }
    }

    /// Serialize to the canonical byte representation.
    ///
    /// Pretty JSON with a trailing newline. Field and list order come from
    /// the struct, so identical manifests always produce identical bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        let mut out = serde_json::to_vec_pretty(self)?;
        out.push(b'\n');
        Ok(out)
    }

    /// Parse and validate a manifest.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, a format version mismatch or
    /// unsafe names.
    pub fn from_slice(data: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_slice(data)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and validate a manifest file.
    ///
    /// # Errors
    ///
    /// See [`InstallerManifest::from_slice`].
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        Self::from_slice(&std::fs::read(path)?)
    }

    /// Check the format version, that there is at least one module and
    /// that every name is path-safe.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.format_version != MANIFEST_FORMAT_VERSION {
            return Err(ManifestError::Format {
                found: self.format_version,
                expected: MANIFEST_FORMAT_VERSION,
            });
        }
        if self.modules.is_empty() {
            return Err(ManifestError::NoModules);
        }
        let names = std::iter::once(&self.name)
            .chain(std::iter::once(&self.resolution_hash))
            .chain(self.modules.iter());
        for name in names {
            if name.is_empty() || !is_safe_name(name) {
                return Err(ManifestError::UnsafeName(name.clone()));
            }
        }
        self.matrix.validate()?;
        Ok(())
    }
}
