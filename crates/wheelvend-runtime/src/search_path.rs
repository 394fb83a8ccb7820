//! Module search path handling.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// An ordered module search path, highest priority first.
///
/// The installer only ever prepends to it. Callers decide how to hand it
/// to the runtime, e.g. via [`SearchPath::to_env_value`] for `PYTHONPATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    /// An empty search path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Split the value of an environment variable such as `PYTHONPATH`.
    pub fn from_env(var: &str) -> Self {
        let entries = std::env::var_os(var)
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        Self { entries }
    }

    /// Put `dir` in front. An existing entry for `dir` is moved, not
    /// duplicated, so repeated installs leave the path unchanged.
    pub fn prepend(&mut self, dir: &Path) {
        self.entries.retain(|e| e != dir);
        self.entries.insert(0, dir.to_path_buf());
    }

    /// Entries, highest priority first.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Join the entries with the platform's path separator.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry contains the separator itself.
    pub fn to_env_value(&self) -> Result<OsString, std::env::JoinPathsError> {
        std::env::join_paths(&self.entries)
    }
}
