//! Vendoring configuration.
//!
//! Resolved in precedence order from explicit overrides (command line or
//! environment), an optional `wheelvend.toml` next to the requirements file,
//! and built-in defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::Deserialize;
use wheelvend_schema::{CacheRoot, PlatformMatrix};

use crate::cache::INDEX_MAX_AGE_SECS;
use crate::error::VendorError;
use crate::index::DEFAULT_INDEX_URL;

/// Environment variable overriding the index URL.
pub const INDEX_URL_ENV: &str = "WHEELVEND_INDEX_URL";

/// Optional configuration file looked up next to the requirements file.
pub const CONFIG_FILE_NAME: &str = "wheelvend.toml";

/// Contents of `wheelvend.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Index base URL.
    pub index_url: Option<String>,
    /// Cache root, relative paths resolve against the file's directory.
    pub cache_dir: Option<PathBuf>,
    /// Replacement platform matrix.
    pub matrix: Option<PlatformMatrix>,
}

impl ConfigFile {
    /// Parse TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::Config`] on invalid TOML or unknown keys.
    pub fn parse(text: &str) -> Result<Self, VendorError> {
        toml::from_str(text).map_err(|e| VendorError::Config(e.to_string()))
    }

    /// Read `path`, or the default if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns I/O errors other than not-found, or parse errors.
    pub fn load(path: &Path) -> Result<Self, VendorError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text)
                .map_err(|e| VendorError::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Values that win over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Cache root.
    pub cache_dir: Option<PathBuf>,
    /// Index base URL.
    pub index_url: Option<String>,
}

/// Effective configuration of a vendoring run.
#[derive(Debug, Clone)]
pub struct VendorConfig {
    /// Where downloads and index responses are cached.
    pub cache_root: CacheRoot,
    /// Index base URL.
    pub index_url: String,
    /// Cells every requirement must cover.
    pub matrix: PlatformMatrix,
    /// Lifetime of cached index responses.
    pub index_max_age: TimeDelta,
}

impl VendorConfig {
    /// Defaults with an explicit cache root.
    pub fn new(cache_root: CacheRoot) -> Self {
        Self {
            cache_root,
            index_url: DEFAULT_INDEX_URL.to_string(),
            matrix: PlatformMatrix::builtin(),
            index_max_age: TimeDelta::seconds(INDEX_MAX_AGE_SECS),
        }
    }

    /// Resolve the configuration for `requirements_file`.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::Config`] for an unreadable config file or if
    /// no cache directory can be determined, and [`VendorError::Matrix`] if
    /// the configured matrix is invalid.
    pub fn load(
        requirements_file: &Path,
        overrides: &ConfigOverrides,
    ) -> Result<Self, VendorError> {
        let base = requirements_file.parent().unwrap_or_else(|| Path::new("."));
        let file = ConfigFile::load(&base.join(CONFIG_FILE_NAME))?;

        let cache_root = match (&overrides.cache_dir, file.cache_dir) {
            (Some(dir), _) => CacheRoot::new(dir),
            (None, Some(dir)) => CacheRoot::new(base.join(dir)),
            (None, None) => CacheRoot::from_env().ok_or_else(|| {
                VendorError::Config("could not determine a cache directory".into())
            })?,
        };

        let mut config = Self::new(cache_root);
        if let Some(url) = overrides.index_url.clone().or(file.index_url) {
            config.index_url = url;
        }
        if let Some(matrix) = file.matrix {
            matrix.validate()?;
            config.matrix = matrix;
        }
        Ok(config)
    }
}
