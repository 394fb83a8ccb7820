//! On-disk cache of index responses and verified artifacts.
//!
//! Artifacts are keyed by a hash of their URL and never expire; callers
//! re-verify them on every read. Index responses are keyed by project name
//! and are considered absent once older than [`INDEX_MAX_AGE_SECS`]. The file
//! mtime is the write timestamp.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;
use wheelvend_schema::CacheRoot;
use wheelvend_schema::hash::url_safe_sha256;

/// How long an index response stays fresh, in seconds.
pub const INDEX_MAX_AGE_SECS: i64 = 60 * 60;

/// Entries further than this many seconds in the future are not trusted.
pub const CLOCK_SKEW_SECS: i64 = 5;

/// Classification of a cache entry's age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Usable.
    Fresh,
    /// Too old, treat as absent.
    Stale,
    /// Written in the future, treat as absent.
    Future,
}

/// Classify an entry of age `age` against `max_age`.
pub fn classify_age(age: TimeDelta, max_age: TimeDelta) -> Freshness {
    if age < TimeDelta::seconds(-CLOCK_SKEW_SECS) {
        Freshness::Future
    } else if age < max_age {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

/// The download cache below a [`CacheRoot`].
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: CacheRoot,
    index_max_age: TimeDelta,
}

impl ArtifactCache {
    /// Cache below `root` with the default index lifetime.
    pub fn new(root: CacheRoot) -> Self {
        Self::with_max_age(root, TimeDelta::seconds(INDEX_MAX_AGE_SECS))
    }

    /// Cache below `root` with a custom index lifetime.
    pub fn with_max_age(root: CacheRoot, index_max_age: TimeDelta) -> Self {
        Self {
            root,
            index_max_age,
        }
    }

    /// The cache root.
    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    /// Where the artifact downloaded from `url` is stored.
    pub fn artifact_path(&self, url: &str) -> PathBuf {
        self.root
            .downloads()
            .join(format!("{}.whl", url_safe_sha256(url.as_bytes())))
    }

    /// Cached bytes for `url`, unverified.
    pub fn read_artifact(&self, url: &str) -> io::Result<Option<Vec<u8>>> {
        read_optional(&self.artifact_path(url))
    }

    /// Store verified bytes for `url`.
    pub fn store_artifact(&self, url: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.artifact_path(url);
        write_atomic(&path, data)?;
        Ok(path)
    }

    /// Where the index response for `name` is stored.
    pub fn index_path(&self, name: &str) -> PathBuf {
        self.root.index_responses().join(format!("{name}.json"))
    }

    /// The cached index response for `name` if it is fresh.
    pub fn read_index(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        self.read_index_at(name, Utc::now())
    }

    /// Same as [`ArtifactCache::read_index`] with an explicit clock.
    pub fn read_index_at(&self, name: &str, now: DateTime<Utc>) -> io::Result<Option<Vec<u8>>> {
        let path = self.index_path(name);
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => DateTime::<Utc>::from(t),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        match classify_age(now - modified, self.index_max_age) {
            Freshness::Fresh => read_optional(&path),
            Freshness::Stale => Ok(None),
            Freshness::Future => {
                warn!("Cache entry {} is from the future, ignoring", path.display());
                Ok(None)
            }
        }
    }

    /// Store an index response for `name`.
    pub fn store_index(&self, name: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.index_path(name);
        write_atomic(&path, data)?;
        Ok(path)
    }
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Write `data` to `path` via a temporary file in the same directory and an
/// atomic rename. Readers see either the old file or the complete new one.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".wheelvend-")
        .tempfile_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(dir: &Path) -> ArtifactCache {
        ArtifactCache::new(CacheRoot::new(dir))
    }

    #[test]
    fn age_classification() {
        let hour = TimeDelta::hours(1);
        assert_eq!(classify_age(TimeDelta::minutes(59), hour), Freshness::Fresh);
        assert_eq!(classify_age(TimeDelta::hours(2), hour), Freshness::Stale);
        assert_eq!(classify_age(TimeDelta::seconds(-3), hour), Freshness::Fresh);
        assert_eq!(classify_age(TimeDelta::seconds(-30), hour), Freshness::Future);
    }

    #[test]
    fn artifact_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache(tmp.path());
        let url = "https://files.example.com/mylib-1.0-py3-none-any.whl";

        assert!(cache.read_artifact(url).unwrap().is_none());
        let path = cache.store_artifact(url, b"wheel").unwrap();
        assert!(path.starts_with(tmp.path().join("downloads")));
        assert_eq!(path.extension().unwrap(), "whl");
        assert_eq!(cache.read_artifact(url).unwrap().unwrap(), b"wheel");
    }

    #[test]
    fn index_expires_but_is_not_deleted() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = cache(tmp.path());
        cache.store_index("mylib", b"{}").unwrap();

        let now = Utc::now();
        assert!(cache.read_index_at("mylib", now).unwrap().is_some());
        assert!(
            cache
                .read_index_at("mylib", now + TimeDelta::hours(2))
                .unwrap()
                .is_none()
        );
        assert!(
            cache
                .read_index_at("mylib", now - TimeDelta::minutes(10))
                .unwrap()
                .is_none()
        );
        assert!(cache.index_path("mylib").is_file());
    }
}
