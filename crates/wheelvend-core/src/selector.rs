//! Release selection against the platform matrix.
//!
//! Walks releases newest to oldest and picks the first one that satisfies
//! the requirement and ships a wheel for every matrix cell.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};
use wheelvend_schema::{DigestMap, OsArch, PlatformCell, PlatformMatrix};

use crate::error::VendorError;
use crate::index::{Artifact, Release};
use crate::requirements::Requirement;
use crate::version::Version;

/// Characters that must never appear in a version from the index.
const UNSAFE_VERSION_CHARS: &[char] = &['/', '\\', ':', '$', '"', '\''];

/// One wheel to download, with the cells it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Wheel filename.
    pub filename: String,
    /// Runtime tag of the wheel.
    pub runtime: String,
    /// Accepted ABIs the wheel provides.
    pub abis: Vec<String>,
    /// Where the wheel is extracted.
    pub os_arch: OsArch,
    /// Download URL (https).
    pub url: String,
    /// Digests to verify against, already filtered for the requirement.
    pub digests: DigestMap,
}

impl Download {
    /// Cells this download covers.
    pub fn cells(&self) -> impl Iterator<Item = PlatformCell> + '_ {
        self.abis.iter().map(|abi| {
            PlatformCell::new(&self.runtime, abi, &self.os_arch.os, &self.os_arch.arch)
        })
    }
}

/// The chosen release of a requirement.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Requirement name.
    pub name: String,
    /// Selected version.
    pub version: String,
    /// Exactly one download per matrix cell, possibly several cells each.
    pub downloads: Vec<Download>,
}

/// What a single artifact offers under the matrix.
fn candidate(artifact: &Artifact, req: &Requirement, matrix: &PlatformMatrix) -> Option<Download> {
    if !matrix.accepts_runtime(&artifact.runtime) {
        return None;
    }

    let mut abis = BTreeSet::new();
    let mut os_arch = None;
    for tag in &artifact.tags {
        if tag.interpreter != artifact.runtime || !matrix.accepts_abi(&tag.interpreter, &tag.abi) {
            continue;
        }
        let Some(pair) = matrix.classify(&tag.platform) else {
            continue;
        };
        // a wheel lands in exactly one os/arch folder
        if os_arch.as_ref().is_some_and(|p| p != &pair) {
            continue;
        }
        os_arch = Some(pair);
        abis.insert(tag.abi.clone());
    }

    Some(Download {
        filename: artifact.filename.clone(),
        runtime: artifact.runtime.clone(),
        abis: abis.into_iter().collect(),
        os_arch: os_arch?,
        url: artifact.url.clone(),
        digests: req.filter_digests(&artifact.digests),
    })
}

/// Select the newest acceptable release.
///
/// # Errors
///
/// - [`VendorError::UnsafeVersion`] if the index reports a hostile version
/// - [`VendorError::PinnedHash`] if a usable wheel does not match the pins
/// - [`VendorError::InsecureUrl`] if a usable wheel is not served over https
/// - [`VendorError::Resolution`] if no release covers the whole matrix
pub fn select_release(
    req: &Requirement,
    releases: &[Release],
    matrix: &PlatformMatrix,
) -> Result<Selection, VendorError> {
    let cells = matrix.cells();
    let exact_pin = req.specifiers.exact_pin();

    for release in releases {
        if release.version.contains(UNSAFE_VERSION_CHARS) {
            return Err(VendorError::UnsafeVersion(release.version.clone()));
        }
        let Some(version) = Version::parse(&release.version) else {
            debug!("Skipping unparseable version {} of {}", release.version, req.name);
            continue;
        };
        if !req.specifiers.contains(&version) {
            continue;
        }

        let mut downloads: Vec<Download> = Vec::new();
        let mut covered = BTreeSet::new();
        for artifact in &release.artifacts {
            let Some(download) = candidate(artifact, req, matrix) else {
                continue;
            };
            if !req.accepts_digests(&artifact.digests) {
                return Err(VendorError::PinnedHash {
                    filename: artifact.filename.clone(),
                    version: release.version.clone(),
                });
            }
            if !download.url.starts_with("https://") {
                return Err(VendorError::InsecureUrl(download.url));
            }

            let new_cells: Vec<_> = download.cells().filter(|c| !covered.contains(c)).collect();
            if new_cells.is_empty() {
                debug!("{} adds no new platform, skipping", download.filename);
                continue;
            }
            covered.extend(new_cells);
            downloads.push(download);
        }

        if downloads.is_empty() {
            continue;
        }

        if release.yanked {
            if exact_pin != Some(&version) {
                warn!("Ignoring yanked release {} of {}", release.version, req.name);
                continue;
            }
            warn!("Using yanked release {} of {} (pinned)", release.version, req.name);
        }

        if let Some(missing) = cells.iter().find(|c| !covered.contains(*c)) {
            debug!(
                "Release {} of {} is incomplete, no wheel for {missing}",
                release.version, req.name
            );
            continue;
        }

        info!("Selected {} {}", req.name, release.version);
        return Ok(Selection {
            name: req.name.clone(),
            version: release.version.clone(),
            downloads,
        });
    }

    Err(VendorError::Resolution {
        name: req.name.clone(),
        constraint: req.specifiers.to_string(),
    })
}
