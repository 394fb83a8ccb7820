//! wheelvend command line
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Thin front-end over `wheelvend-core` (build time) and `wheelvend-runtime`
//! (consumer side).
//!
//! ```text
//! wheelvend embed   [REQUIREMENTS]     # resolve, fetch, vendor, write installer.json
//! wheelvend check   [REQUIREMENTS]     # fail if the committed bundle is stale
//! wheelvend install <BUNDLE>           # install a bundle for the local interpreter
//! ```

pub mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wheelvend_core::config::{ConfigOverrides, INDEX_URL_ENV, VendorConfig};
use wheelvend_schema::CacheRoot;
use wheelvend_schema::paths::CACHE_DIR_ENV;

#[derive(Debug, Parser)]
#[command(name = "wheelvend")]
#[command(author, version, about = "wheelvend - vendor platform wheels for offline install")]
pub struct Cli {
    /// Cache directory for downloads and installs
    #[arg(long, global = true, env = CACHE_DIR_ENV)]
    pub cache_dir: Option<PathBuf>,

    /// Package index base URL
    #[arg(long, global = true, env = INDEX_URL_ENV)]
    pub index_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Vendor every requirement and write the installer manifest
    Embed {
        /// Requirements file
        #[arg(default_value = "requirements.txt")]
        requirements: PathBuf,
    },
    /// Check that the committed installer manifest is up to date
    Check {
        /// Requirements file
        #[arg(default_value = "requirements.txt")]
        requirements: PathBuf,
    },
    /// Install a vendored bundle for the local interpreter
    Install {
        /// Bundle directory (the one holding installer.json)
        bundle: PathBuf,
        /// Interpreter to probe
        #[arg(long)]
        python: Option<String>,
    },
}

impl Cli {
    /// Overrides taken from global flags.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cache_dir: self.cache_dir.clone(),
            index_url: self.index_url.clone(),
        }
    }

    /// Effective vendoring configuration for `requirements`.
    pub fn vendor_config(&self, requirements: &Path) -> Result<VendorConfig> {
        VendorConfig::load(requirements, &self.overrides())
            .with_context(|| format!("Failed to load configuration for {}", requirements.display()))
    }

    /// Cache root for the runtime installer.
    pub fn cache_root(&self) -> Result<CacheRoot> {
        match &self.cache_dir {
            Some(dir) => Ok(CacheRoot::new(dir)),
            None => CacheRoot::from_env().context("Could not determine a cache directory"),
        }
    }
}
