//! Check command

use std::path::Path;

use anyhow::{Result, bail};
use wheelvend_core::{CheckOutcome, check as check_bundle};

use crate::Cli;

/// Fail unless the committed bundle matches `requirements`.
pub fn check(cli: &Cli, requirements: &Path) -> Result<()> {
    let config = cli.vendor_config(requirements)?;
    match check_bundle(requirements, &config)? {
        CheckOutcome::UpToDate => {
            println!("Installer is up to date.");
            Ok(())
        }
        CheckOutcome::Stale => bail!(
            "Installer for {} is out of date. Run `wheelvend embed`.",
            requirements.display()
        ),
        CheckOutcome::MissingModule(module) => {
            bail!("Vendored module {module} is missing. Run `wheelvend embed`.")
        }
    }
}
