//! Download and verify artifacts through the cache.

use std::sync::Arc;

use tracing::{debug, info};
use wheelvend_schema::hash::{self, DigestAlgo};
use wheelvend_schema::{DigestError, DigestMap};

use crate::cache::ArtifactCache;
use crate::error::VendorError;
use crate::selector::Download;
use crate::transport::Transport;

/// Host prefix dropped from URLs in log lines.
const FILES_HOST: &str = "https://files.pythonhosted.org/";

/// Shorten a download URL for logging.
pub(crate) fn display_url(url: &str) -> &str {
    url.strip_prefix(FILES_HOST).unwrap_or(url)
}

/// Fetches artifacts, verifying every byte against the expected digests.
#[derive(Debug)]
pub struct Fetcher<T: Transport> {
    transport: Arc<T>,
    cache: ArtifactCache,
}

impl<T: Transport> Fetcher<T> {
    /// Fetcher writing into `cache`.
    pub fn new(transport: Arc<T>, cache: ArtifactCache) -> Self {
        Self { transport, cache }
    }

    /// Bytes of a selected download.
    ///
    /// # Errors
    ///
    /// See [`Fetcher::fetch_verified`].
    pub async fn fetch(&self, download: &Download) -> Result<Vec<u8>, VendorError> {
        self.fetch_verified(&download.url, &download.digests).await
    }

    /// Bytes of `url`, verified against `digests`.
    ///
    /// A cached copy is verified before it is returned; if it does not
    /// match, that is an error and nothing is refetched. Fresh downloads are
    /// only cached after they verified.
    ///
    /// # Errors
    ///
    /// - [`VendorError::Digest`] if `digests` is empty or uses an
    ///   unsupported algorithm
    /// - [`VendorError::InsecureUrl`] for anything but https
    /// - [`VendorError::CacheCorrupt`] if the cached copy does not verify
    /// - [`VendorError::Integrity`] if the downloaded bytes do not verify
    pub async fn fetch_verified(
        &self,
        url: &str,
        digests: &DigestMap,
    ) -> Result<Vec<u8>, VendorError> {
        if digests.is_empty() {
            return Err(DigestError::Empty.into());
        }
        for algo in digests.keys() {
            algo.parse::<DigestAlgo>()?;
        }
        if !url.starts_with("https://") {
            return Err(VendorError::InsecureUrl(url.to_string()));
        }

        if let Some(data) = self.cache.read_artifact(url)? {
            debug!("Using cached {}", display_url(url));
            hash::verify(&data, digests, url).map_err(|source| VendorError::CacheCorrupt {
                path: self.cache.artifact_path(url),
                source,
            })?;
            return Ok(data);
        }

        info!("Downloading {}", display_url(url));
        let data = self.transport.get(url).await?.to_vec();
        hash::verify(&data, digests, url).map_err(|source| VendorError::Integrity {
            url: url.to_string(),
            source,
        })?;
        self.cache.store_artifact(url, &data)?;
        Ok(data)
    }
}
