//! Cache root layout shared by the vendoring pipeline and the runtime
//! installer.
//!
//! ```text
//! <cache root>/
//! ├── downloads/
//! │   ├── <url hash>.whl          # verified artifact bytes
//! │   └── pypi-json/<name>.json   # cached index responses (mtime = age)
//! └── vendored/<name>/<hash>/
//!     ├── <os>-<arch>/            # install directory
//!     └── <os>-<arch>-<runtime>-<abi>.installed
//! ```

use std::path::{Path, PathBuf};

use crate::matrix::PlatformCell;

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "WHEELVEND_CACHE_DIR";

/// Directory name below the platform cache directory.
const CACHE_SUBDIR: &str = "wheelvend";

/// An explicit cache root. Directories below it are created lazily by the
/// code that writes into them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    root: PathBuf,
}

impl CacheRoot {
    /// Use `root` as the cache root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the default cache root: `$WHEELVEND_CACHE_DIR`, else the
    /// user's cache directory joined with `wheelvend`.
    ///
    /// Returns `None` if neither can be determined.
    pub fn from_env() -> Option<Self> {
        if let Ok(val) = std::env::var(CACHE_DIR_ENV) {
            if !val.is_empty() {
                return Some(Self::new(val));
            }
        }
        dirs::cache_dir().map(|d| Self::new(d.join(CACHE_SUBDIR)))
    }

    /// The root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `downloads/`: verified artifacts.
    pub fn downloads(&self) -> PathBuf {
        self.root.join("downloads")
    }

    /// `downloads/pypi-json/`: cached index responses.
    pub fn index_responses(&self) -> PathBuf {
        self.downloads().join("pypi-json")
    }

    /// `vendored/<name>/<hash>/`: install base for one bundle.
    pub fn vendored(&self, name: &str, resolution_hash: &str) -> PathBuf {
        self.root.join("vendored").join(name).join(resolution_hash)
    }

    /// Install directory for one `(os, arch)` of a bundle.
    pub fn install_dir(&self, name: &str, resolution_hash: &str, cell: &PlatformCell) -> PathBuf {
        self.vendored(name, resolution_hash)
            .join(format!("{}-{}", cell.os, cell.arch))
    }

    /// Install marker for one exact cell of a bundle.
    pub fn install_marker(
        &self,
        name: &str,
        resolution_hash: &str,
        cell: &PlatformCell,
    ) -> PathBuf {
        self.vendored(name, resolution_hash).join(format!(
            "{}-{}-{}-{}.installed",
            cell.os, cell.arch, cell.runtime, cell.abi
        ))
    }
}
