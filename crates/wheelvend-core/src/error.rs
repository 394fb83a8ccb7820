//! Errors for the vendoring pipeline.
//!
//! Every variant is fatal to a vendoring run; nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;
use wheelvend_schema::{DigestError, ManifestError, MatrixError};

/// Anything that stops a vendoring run.
#[derive(Error, Debug)]
pub enum VendorError {
    // Input validation, raised before any I/O
    /// A project or bundle name that cannot be a path component.
    #[error("Invalid requirement name: '{0}'")]
    UnsafeName(String),

    /// A malformed requirement line.
    #[error("Invalid requirement '{line}': {reason}")]
    Requirement {
        /// The offending line, trimmed.
        line: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The requirements file declares nothing to vendor.
    #[error("No requirements specified")]
    NoRequirements,

    /// A requirement form we do not vendor (direct URL, marker).
    #[error("{0} in requirement not implemented")]
    Unsupported(&'static str),

    /// An index version string with path or quote characters.
    #[error("Unexpected version on index: '{0}'")]
    UnsafeVersion(String),

    /// A download URL that is not https.
    #[error("Insecure or invalid download for {0}")]
    InsecureUrl(String),

    /// The platform matrix is unusable.
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    /// Digest set without a usable algorithm, or a bad digest value.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// Unreadable or invalid `wheelvend.toml`.
    #[error("Config error: {0}")]
    Config(String),

    // Resolution
    /// No release satisfies the constraint on every platform.
    #[error("No release of {name} matching '{constraint}' provides every platform")]
    Resolution {
        /// Project name.
        name: String,
        /// The requested specifiers.
        constraint: String,
    },

    // Integrity
    /// Downloaded bytes do not match the index digest.
    #[error("Download verification failed: {source}")]
    Integrity {
        /// Where the bytes came from.
        url: String,
        /// The mismatch.
        #[source]
        source: DigestError,
    },

    /// A cached artifact no longer matches its digest.
    #[error("Cached artifact {} is corrupt: {source}", .path.display())]
    CacheCorrupt {
        /// Path of the cache entry.
        path: PathBuf,
        /// The mismatch.
        #[source]
        source: DigestError,
    },

    /// The selected artifact is not covered by the pinned hashes.
    #[error("Would use {filename} of {version} but hash does not match")]
    PinnedHash {
        /// Wheel filename.
        filename: String,
        /// Release version.
        version: String,
    },

    // Transient I/O
    /// HTTP client failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-HTTP transport failure, e.g. an error status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Index response that is not the expected JSON.
    #[error("Invalid index response: {0}")]
    Json(#[from] serde_json::Error),

    /// Wheel that is not a readable zip.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Failure while walking an extracted tree.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Manifest serialization or parse failure.
    #[error("Installer manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

impl VendorError {
    /// Whether this error means content did not match its expected digest.
    ///
    /// These are security relevant and must never be downgraded.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::Integrity { .. } | Self::CacheCorrupt { .. } | Self::PinnedHash { .. }
        )
    }
}
