//! Embed command

use std::path::Path;

use anyhow::{Context, Result};
use wheelvend_core::Vendorer;

use crate::Cli;

/// Vendor `requirements` and write the installer manifest.
pub async fn embed(cli: &Cli, requirements: &Path) -> Result<()> {
    let config = cli.vendor_config(requirements)?;
    let vendorer = Vendorer::from_config(config)?;
    let outcome = vendorer
        .embed(requirements)
        .await
        .with_context(|| format!("Failed to vendor {}", requirements.display()))?;

    println!(
        "Vendored {} module(s) for {} ({})",
        outcome.manifest.modules.len(),
        outcome.manifest.name,
        outcome.manifest.resolution_hash
    );
    println!("Wrote {}", outcome.manifest_path.display());
    Ok(())
}
