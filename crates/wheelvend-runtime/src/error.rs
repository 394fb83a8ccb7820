//! Errors raised by the runtime installer

use thiserror::Error;
use wheelvend_schema::ManifestError;

/// Why a bundle could not be installed.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The interpreter's runtime tag is not in the bundle's matrix.
    #[error("Unsupported python \"{0}\" for installation of vendored packages")]
    UnsupportedRuntime(String),

    /// The host cell is not in the bundle's matrix.
    #[error("Unsupported platform {cell} for installation of {bundle} packages")]
    UnsupportedPlatform {
        /// The detected cell.
        cell: String,
        /// Bundle name.
        bundle: String,
    },

    /// The interpreter could not be queried.
    #[error("Could not detect interpreter configuration: {0}")]
    Probe(String),

    /// The bundle tree does not match its manifest.
    #[error("Invalid bundle: {0}")]
    Bundle(String),

    /// Missing or invalid `installer.json`.
    #[error("Invalid installer manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while walking the bundle.
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
}
