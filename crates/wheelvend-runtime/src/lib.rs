//! wheelvend runtime installer
//!
//! The consumer-side half of wheelvend. A vendored bundle is a directory
//! holding `installer.json` plus one folder per module; [`Installer`] makes
//! the files for the current host importable without touching the network.
//!
//! ```no_run
//! use wheelvend_runtime::{Installer, InterpreterProbe, SearchPath};
//! use wheelvend_schema::CacheRoot;
//!
//! # fn main() -> Result<(), wheelvend_runtime::InstallError> {
//! let cache = CacheRoot::from_env().expect("no cache directory");
//! let installer = Installer::load("vendored", cache)?;
//! let mut path = SearchPath::from_env("PYTHONPATH");
//! installer.install(&InterpreterProbe::default(), &mut path)?;
//! # Ok(())
//! # }
//! ```

pub mod detect;
pub mod error;
pub mod install;
pub mod search_path;

pub use detect::{CellDetector, HostCell, InterpreterProbe, SysconfigVars, detect_cell};
pub use error::InstallError;
pub use install::Installer;
pub use search_path::SearchPath;
