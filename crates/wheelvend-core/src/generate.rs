//! Installer manifest generation.
//!
//! The manifest is the contract between a vendoring run and the runtime
//! installer. It is rendered deterministically so a committed copy can be
//! diffed against a fresh rendering.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;
use wheelvend_schema::{InstallerManifest, PlatformMatrix};

use crate::cache::write_atomic;
use crate::error::VendorError;
use crate::requirements::RequirementsFile;

/// The manifest a vendoring run of `requirements` under `matrix` produces.
pub fn expected_manifest(
    requirements: &RequirementsFile,
    matrix: &PlatformMatrix,
) -> InstallerManifest {
    InstallerManifest::new(
        requirements.name.clone(),
        requirements.resolution_hash.clone(),
        requirements.module_names(),
        matrix.clone(),
    )
}

/// Render `manifest` to its on-disk bytes.
///
/// # Errors
///
/// Returns [`VendorError::Manifest`] if the manifest does not validate.
pub fn render_manifest(manifest: &InstallerManifest) -> Result<Vec<u8>, VendorError> {
    manifest.validate()?;
    Ok(manifest.to_bytes()?)
}

/// Atomically write `manifest` to `path`.
///
/// # Errors
///
/// Returns validation or I/O errors.
pub fn write_manifest(manifest: &InstallerManifest, path: &Path) -> Result<(), VendorError> {
    let data = render_manifest(manifest)?;
    write_atomic(path, &data)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Remove a previous manifest at `path`, if any.
///
/// # Errors
///
/// Fails if `path` exists but is not a regular file.
pub fn remove_manifest(path: &Path) -> Result<(), VendorError> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_file() => Ok(fs::remove_file(path)?),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists but is not a file", path.display()),
        )
        .into()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Whether the file at `path` is byte-identical to a fresh rendering of
/// `manifest`. A missing file is not up to date.
///
/// # Errors
///
/// Returns validation errors or I/O errors other than not-found.
pub fn is_up_to_date(manifest: &InstallerManifest, path: &Path) -> Result<bool, VendorError> {
    let expected = render_manifest(manifest)?;
    match fs::read(path) {
        Ok(actual) => Ok(actual == expected),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
