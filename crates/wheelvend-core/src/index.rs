//! Package index client (PyPI JSON API).
//!
//! Fetches `GET {index_url}/{name}/json`, keeps the raw response in the
//! [`ArtifactCache`] for an hour and turns it into a newest-first list of
//! [`Release`]s. Only wheels are kept; sdists and other files are dropped.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};
use wheelvend_schema::{DigestMap, is_safe_name};

use crate::cache::ArtifactCache;
use crate::error::VendorError;
use crate::transport::Transport;

/// Default index base URL.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

#[derive(Debug, Deserialize)]
struct ProjectDocument {
    #[serde(default)]
    releases: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    #[serde(default)]
    python_version: String,
    url: String,
    #[serde(default)]
    digests: DigestMap,
    #[serde(default)]
    yanked: bool,
}

/// One `(interpreter, abi, platform)` triple from a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelTag {
    /// Interpreter tag, e.g. `cp312`.
    pub interpreter: String,
    /// ABI tag, e.g. `cp312` or `abi3`.
    pub abi: String,
    /// Platform tag, e.g. `manylinux_2_17_x86_64`.
    pub platform: String,
}

/// A downloadable wheel of a release.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Wheel filename.
    pub filename: String,
    /// The index's `python_version` field.
    pub runtime: String,
    /// Expanded compatibility tags.
    pub tags: Vec<WheelTag>,
    /// Download URL.
    pub url: String,
    /// Digests advertised by the index.
    pub digests: DigestMap,
    /// Whether this file was yanked.
    pub yanked: bool,
}

/// One version of a project.
#[derive(Debug, Clone)]
pub struct Release {
    /// Version string as published.
    pub version: String,
    /// Whether any file of the release was yanked.
    pub yanked: bool,
    /// Wheels of the release.
    pub artifacts: Vec<Artifact>,
}

/// Expand the compatibility tags of a wheel filename.
///
/// `{name}-{ver}[-{build}]-{py}-{abi}-{plat}.whl`, where each of the last
/// three may be a `.`-separated set. Returns `None` for anything else.
pub fn parse_wheel_tags(filename: &str) -> Option<Vec<WheelTag>> {
    let stem = filename.strip_suffix(".whl")?;
    let parts: Vec<&str> = stem.split('-').collect();
    if !(5..=6).contains(&parts.len()) {
        return None;
    }
    let [py, abi, plat] = parts[parts.len() - 3..] else {
        return None;
    };

    let mut tags = Vec::new();
    for interpreter in py.split('.') {
        for abi in abi.split('.') {
            for platform in plat.split('.') {
                tags.push(WheelTag {
                    interpreter: interpreter.to_string(),
                    abi: abi.to_string(),
                    platform: platform.to_string(),
                });
            }
        }
    }
    Some(tags)
}

/// Parse an index response into releases, newest first.
///
/// The index lists releases oldest first, so the document order is reversed.
///
/// # Errors
///
/// Returns [`VendorError::Json`] if the document is malformed.
pub fn parse_project(data: &[u8]) -> Result<Vec<Release>, VendorError> {
    let doc: ProjectDocument = serde_json::from_slice(data)?;
    let mut releases = Vec::with_capacity(doc.releases.len());

    for (version, files) in doc.releases {
        let files: Vec<FileEntry> = serde_json::from_value(files)?;
        let yanked = files.iter().any(|f| f.yanked);
        let artifacts = files
            .into_iter()
            .filter_map(|f| {
                let tags = parse_wheel_tags(&f.filename)?;
                Some(Artifact {
                    filename: f.filename,
                    runtime: f.python_version,
                    tags,
                    url: f.url,
                    digests: f.digests,
                    yanked: f.yanked,
                })
            })
            .collect();
        releases.push(Release {
            version,
            yanked,
            artifacts,
        });
    }

    releases.reverse();
    Ok(releases)
}

/// Client for the index JSON API, backed by the response cache.
#[derive(Debug)]
pub struct IndexClient<T: Transport> {
    transport: Arc<T>,
    cache: ArtifactCache,
    base_url: String,
}

impl<T: Transport> IndexClient<T> {
    /// Client for `base_url` (no trailing slash needed).
    pub fn new(transport: Arc<T>, cache: ArtifactCache, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            cache,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The URL queried for `name`.
    pub fn project_url(&self, name: &str) -> String {
        format!("{}/{name}/json", self.base_url)
    }

    /// Releases of `name`, newest first.
    ///
    /// A fresh cached response is used as is. Otherwise the index is queried
    /// and the response cached once it parsed. Network failures are fatal.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::UnsafeName`] before any I/O for unsafe names,
    /// transport errors, or [`VendorError::Json`] for malformed responses.
    pub async fn releases(&self, name: &str) -> Result<Vec<Release>, VendorError> {
        if !is_safe_name(name) {
            return Err(VendorError::UnsafeName(name.to_string()));
        }

        if let Some(data) = self.cache.read_index(name)? {
            debug!("Using cached index response for {name}");
            return parse_project(&data);
        }

        let url = self.project_url(name);
        info!("Fetching {url}");
        let data = self.transport.get(&url).await?;
        let releases = parse_project(&data)?;
        self.cache.store_index(name, &data)?;
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpTransport;
    use mockito::Server;
    use wheelvend_schema::CacheRoot;

    const DOC: &str = r#"{
        "info": {"name": "mylib"},
        "releases": {
            "1.0.0": [
                {"filename": "mylib-1.0.0.tar.gz", "python_version": "source",
                 "url": "https://files.example.com/mylib-1.0.0.tar.gz",
                 "digests": {"sha256": "aa"}, "yanked": false},
                {"filename": "mylib-1.0.0-cp312-cp312-win_amd64.whl", "python_version": "cp312",
                 "url": "https://files.example.com/mylib-1.0.0-cp312-cp312-win_amd64.whl",
                 "digests": {"sha256": "bb", "md5": "cc"}, "yanked": false}
            ],
            "2.0.0": [
                {"filename": "mylib-2.0.0-cp312-cp312-win_amd64.whl", "python_version": "cp312",
                 "url": "https://files.example.com/mylib-2.0.0-cp312-cp312-win_amd64.whl",
                 "digests": {"sha256": "dd"}, "yanked": true}
            ]
        }
    }"#;

    #[test]
    fn wheel_tags_expand_compressed_sets() {
        let tags =
            parse_wheel_tags("mylib-1.0-cp312-cp312-manylinux_2_17_x86_64.manylinux2014_x86_64.whl")
                .unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].platform, "manylinux2014_x86_64");

        let tags = parse_wheel_tags("mylib-1.0-1build-py2.py3-none-any.whl").unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].interpreter, "py2");
        assert_eq!(tags[0].abi, "none");

        assert!(parse_wheel_tags("mylib-1.0.tar.gz").is_none());
        assert!(parse_wheel_tags("mylib-cp312-win_amd64.whl").is_none());
    }

    #[test]
    fn releases_are_newest_first_and_wheels_only() {
        let releases = parse_project(DOC.as_bytes()).unwrap();
        assert_eq!(releases[0].version, "2.0.0");
        assert!(releases[0].yanked);
        assert_eq!(releases[1].version, "1.0.0");
        assert!(!releases[1].yanked);
        assert_eq!(releases[1].artifacts.len(), 1);
        assert_eq!(releases[1].artifacts[0].runtime, "cp312");
        assert_eq!(releases[1].artifacts[0].digests.len(), 2);
    }

    #[tokio::test]
    async fn fetches_once_then_uses_cache() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/mylib/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(DOC)
            .expect(1)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let client = IndexClient::new(
            Arc::new(HttpTransport::new().unwrap()),
            ArtifactCache::new(CacheRoot::new(tmp.path())),
            format!("{}/", server.url()),
        );

        let first = client.releases("mylib").await.unwrap();
        let second = client.releases("mylib").await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        m.assert_async().await;
    }

    #[tokio::test]
    async fn unsafe_name_fails_before_any_request() {
        let tmp = tempfile::tempdir().unwrap();
        let client = IndexClient::new(
            Arc::new(HttpTransport::new().unwrap()),
            ArtifactCache::new(CacheRoot::new(tmp.path())),
            "https://invalid.example",
        );
        let err = client.releases("../etc").await.unwrap_err();
        assert!(matches!(err, VendorError::UnsafeName(_)));
    }

    #[tokio::test]
    async fn server_error_is_fatal_and_not_cached() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/mylib/json")
            .with_status(500)
            .create_async()
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(CacheRoot::new(tmp.path()));
        let client = IndexClient::new(
            Arc::new(HttpTransport::new().unwrap()),
            cache.clone(),
            server.url(),
        );

        assert!(client.releases("mylib").await.is_err());
        assert!(!cache.index_path("mylib").exists());
    }
}
