//! Wheel extraction.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use tracing::warn;
use zip::ZipArchive;

use crate::error::VendorError;

/// Wheel metadata that differs per build and is never installed.
pub const EXCLUDED_SUFFIXES: &[&str] = &[".dist-info/RECORD", ".dist-info/WHEEL"];

fn is_excluded(name: &str) -> bool {
    EXCLUDED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Extract a wheel into `dest_dir`.
///
/// Directory entries, [`EXCLUDED_SUFFIXES`] and members whose path would
/// escape `dest_dir` are skipped. Returns the relative paths written.
pub fn extract_artifact(data: &[u8], dest_dir: &Path) -> Result<Vec<PathBuf>, VendorError> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() || is_excluded(file.name()) {
            continue;
        }
        let Some(relative_path) = file.enclosed_name() else {
            warn!("Skipping unsafe archive member {}", file.name());
            continue;
        };

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode & 0o777))?;
        }

        extracted.push(relative_path);
    }

    Ok(extracted)
}
