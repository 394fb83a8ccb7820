//! Install command

use std::path::Path;

use anyhow::{Context, Result};
use wheelvend_runtime::{Installer, InterpreterProbe, SearchPath};

use crate::Cli;

/// Search path variable the install directory is added to.
const SEARCH_PATH_VAR: &str = "PYTHONPATH";

/// Install `bundle` for the interpreter `python` (or the default one).
pub fn install(cli: &Cli, bundle: &Path, python: Option<&str>) -> Result<()> {
    let installer = Installer::load(bundle, cli.cache_root()?)
        .with_context(|| format!("Failed to load bundle {}", bundle.display()))?;
    let probe = python.map(InterpreterProbe::new).unwrap_or_default();

    let mut search_path = SearchPath::from_env(SEARCH_PATH_VAR);
    let dir = installer.install(&probe, &mut search_path)?;

    println!("{}", dir.display());
    let value = search_path.to_env_value()?;
    tracing::debug!("{SEARCH_PATH_VAR}={}", value.to_string_lossy());
    Ok(())
}
