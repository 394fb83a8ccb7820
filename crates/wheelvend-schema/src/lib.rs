//! Shared types for wheelvend.
//!
//! Everything in here is needed on both sides of the vendoring boundary:
//! the build-time pipeline produces these values and the runtime installer
//! consumes them, so the wire format lives in one place.

pub mod hash;
pub mod manifest;
pub mod matrix;
pub mod name;
pub mod paths;

// Re-exports
pub use hash::{DigestAlgo, DigestError, DigestMap};
pub use manifest::{InstallerManifest, ManifestError};
pub use matrix::{MatrixError, OsArch, OsFamily, PlatformCell, PlatformMatrix, RuntimeTag};
pub use name::is_safe_name;
pub use paths::CacheRoot;

/// File name of the generated installer manifest inside the vendored folder.
pub const MANIFEST_FILE_NAME: &str = "installer.json";

/// Version of the manifest layout. Bumped whenever the runtime installer
/// would read an older manifest differently.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// Directory (below a module folder) holding files shared by every platform.
pub const ANY_DIR: &str = "any";
