//! wheelvend build-time pipeline.
//!
//! Resolves the requirements of a consumer project against a package index,
//! downloads and verifies one wheel per platform cell, extracts them into a
//! vendored tree, folds files that are identical on every platform into a
//! shared directory and writes the installer manifest consumed by
//! `wheelvend-runtime`.
//!
//! # Pipeline
//!
//! ```text
//! requirements.txt
//!   └─ index      (release metadata, cached for an hour)
//!       └─ selector   (newest release covering the whole matrix)
//!           └─ fetch      (https only, verified, cached by URL hash)
//!               └─ extract + merge  (vendored/<name>/{any/any,<os>/<arch>})
//!                   └─ generate       (vendored/installer.json)
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod generate;
pub mod index;
pub mod merge;
pub mod requirements;
pub mod selector;
pub mod transport;
pub mod vendor;
pub mod version;

pub use config::VendorConfig;
pub use error::VendorError;
pub use transport::{HttpTransport, Transport};
pub use vendor::{CheckOutcome, EmbedOutcome, Vendorer, check};

/// User Agent string for index and artifact requests
pub const USER_AGENT: &str = concat!("wheelvend/", env!("CARGO_PKG_VERSION"));
