//! The vendoring run: requirements in, `vendored/` tree and manifest out.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use wheelvend_schema::{ANY_DIR, InstallerManifest, MANIFEST_FILE_NAME};

use crate::cache::ArtifactCache;
use crate::config::VendorConfig;
use crate::error::VendorError;
use crate::extract::extract_artifact;
use crate::fetch::{Fetcher, display_url};
use crate::generate::{expected_manifest, is_up_to_date, remove_manifest, write_manifest};
use crate::index::IndexClient;
use crate::merge::merge_platforms;
use crate::requirements::RequirementsFile;
use crate::selector::select_release;
use crate::transport::{HttpTransport, Transport};

/// Folder next to the requirements file receiving the bundle.
pub const VENDORED_DIR: &str = "vendored";

/// Outcome of [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The committed manifest matches a fresh rendering.
    UpToDate,
    /// No manifest, or one that differs.
    Stale,
    /// The manifest matches but a module folder is missing.
    MissingModule(String),
}

/// Compare the committed bundle of `requirements_file` with what a
/// vendoring run under `config` would write, without touching the network.
///
/// # Errors
///
/// Returns requirement parse errors or I/O errors.
pub fn check(requirements_file: &Path, config: &VendorConfig) -> Result<CheckOutcome, VendorError> {
    let requirements = RequirementsFile::load(requirements_file)?;
    let manifest = expected_manifest(&requirements, &config.matrix);
    let bundle_dir = bundle_dir(requirements_file);

    if !is_up_to_date(&manifest, &bundle_dir.join(MANIFEST_FILE_NAME))? {
        return Ok(CheckOutcome::Stale);
    }
    for module in &manifest.modules {
        if !bundle_dir.join(module).join(ANY_DIR).join(ANY_DIR).is_dir() {
            return Ok(CheckOutcome::MissingModule(module.clone()));
        }
    }
    Ok(CheckOutcome::UpToDate)
}

/// The bundle directory for `requirements_file`.
pub fn bundle_dir(requirements_file: &Path) -> PathBuf {
    requirements_file
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(VENDORED_DIR)
}

/// Result of a successful [`Vendorer::embed`].
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    /// The written manifest.
    pub manifest: InstallerManifest,
    /// Where it was written.
    pub manifest_path: PathBuf,
}

/// Runs the vendoring pipeline for one configuration.
#[derive(Debug)]
pub struct Vendorer<T: Transport> {
    config: VendorConfig,
    index: IndexClient<T>,
    fetcher: Fetcher<T>,
}

impl Vendorer<HttpTransport> {
    /// Vendorer talking to the real index over HTTPS.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: VendorConfig) -> Result<Self, VendorError> {
        Ok(Self::new(config, Arc::new(HttpTransport::new()?)))
    }
}

impl<T: Transport> Vendorer<T> {
    /// Vendorer using `transport` for every request.
    pub fn new(config: VendorConfig, transport: Arc<T>) -> Self {
        let cache = ArtifactCache::with_max_age(config.cache_root.clone(), config.index_max_age);
        Self {
            index: IndexClient::new(
                Arc::clone(&transport),
                cache.clone(),
                config.index_url.clone(),
            ),
            fetcher: Fetcher::new(transport, cache),
            config,
        }
    }

    /// The effective configuration.
    pub fn config(&self) -> &VendorConfig {
        &self.config
    }

    /// Vendor every requirement of `requirements_file`.
    ///
    /// The old manifest is removed first and the new one only written once
    /// every requirement is vendored, so a failed run leaves no manifest.
    ///
    /// # Errors
    ///
    /// Any [`VendorError`]; the run stops at the first one.
    pub async fn embed(&self, requirements_file: &Path) -> Result<EmbedOutcome, VendorError> {
        let matrix = &self.config.matrix;
        matrix.validate()?;
        let requirements = RequirementsFile::load(requirements_file)?;

        let bundle_dir = bundle_dir(requirements_file);
        let manifest_path = bundle_dir.join(MANIFEST_FILE_NAME);
        remove_manifest(&manifest_path)?;

        let pairs = matrix.pairs();
        for req in &requirements.requirements {
            info!("Vendoring {}{}", req.name, req.specifiers);
            let releases = self.index.releases(&req.name).await?;
            let selection = select_release(req, &releases, matrix)?;

            let pkg_dir = bundle_dir.join(&req.name);
            if pkg_dir.exists() {
                fs::remove_dir_all(&pkg_dir)?;
            }
            for download in &selection.downloads {
                let data = self.fetcher.fetch(download).await?;
                let dest = pkg_dir.join(&download.os_arch.os).join(&download.os_arch.arch);
                info!("Extracting {} to {}", display_url(&download.url), dest.display());
                extract_artifact(&data, &dest)?;
            }
            let report = merge_platforms(&pkg_dir, &pairs)?;
            info!(
                "{} {}: {} shared files, {} empty directories removed",
                selection.name,
                selection.version,
                report.moved.len(),
                report.pruned
            );
        }

        let manifest = expected_manifest(&requirements, matrix);
        write_manifest(&manifest, &manifest_path)?;
        Ok(EmbedOutcome {
            manifest,
            manifest_path,
        })
    }
}
