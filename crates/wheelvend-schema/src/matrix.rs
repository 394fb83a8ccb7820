//! The platform matrix: the fixed set of (runtime, ABI, OS, architecture)
//! cells that vendoring must cover.
//!
//! Wheels carry "platform tags" such as `manylinux_2_17_x86_64` or
//! `macosx_11_0_universal2`. Each tag is an OS-specific prefix, an optional
//! version, and an architecture suffix. Since the consumer has no notion of
//! platform tags we only look for prefixes and suffixes we believe will work.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::name::is_safe_name;

/// Errors raised when a matrix definition is unusable.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MatrixError {
    /// A list that must not be empty is empty.
    #[error("Missing {0} definition")]
    Missing(&'static str),

    /// A name contains characters that are not allowed in paths.
    #[error("Invalid {what} requested: '{value}'")]
    UnsafeName {
        /// Which table the value came from.
        what: &'static str,
        /// The offending value.
        value: String,
    },
}

/// An accepted runtime (interpreter) tag and the ABI tags accepted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeTag {
    /// Runtime tag as used in wheel file names, e.g. `cp312`.
    pub tag: String,
    /// ABI tags accepted for this runtime, e.g. `["cp312"]`.
    pub abis: Vec<String>,
}

/// An OS family with the platform-tag prefixes and arch suffixes it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsFamily {
    /// Name of the OS family, also used as a directory name (`linux-gnu`).
    pub name: String,
    /// Platform-tag prefixes, matched as `<prefix>_...`.
    pub platforms: Vec<String>,
    /// Architectures, matched as `..._<arch>`.
    pub arches: Vec<String>,
}

/// An `(os, arch)` pairing; one vendored directory per pairing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OsArch {
    /// OS family name.
    pub os: String,
    /// Architecture name.
    pub arch: String,
}

impl OsArch {
    /// Create a new pairing.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }
}

impl std::fmt::Display for OsArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// One cell of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformCell {
    /// Runtime tag (`cp312`).
    pub runtime: String,
    /// ABI tag (`cp312`).
    pub abi: String,
    /// OS family (`linux-gnu`).
    pub os: String,
    /// Architecture (`x86_64`).
    pub arch: String,
}

impl PlatformCell {
    /// Create a new cell.
    pub fn new(
        runtime: impl Into<String>,
        abi: impl Into<String>,
        os: impl Into<String>,
        arch: impl Into<String>,
    ) -> Self {
        Self {
            runtime: runtime.into(),
            abi: abi.into(),
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The `(os, arch)` part of this cell.
    pub fn os_arch(&self) -> OsArch {
        OsArch::new(&self.os, &self.arch)
    }
}

impl std::fmt::Display for PlatformCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}-{}", self.runtime, self.abi, self.os, self.arch)
    }
}

/// The full set of supported cells.
///
/// Order matters: the first `(os, arch)` pair is the reference platform
/// when merging, and the generated manifest preserves declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMatrix {
    /// Accepted runtimes.
    pub runtimes: Vec<RuntimeTag>,
    /// Accepted OS families.
    pub os: Vec<OsFamily>,
}

impl Default for PlatformMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

impl PlatformMatrix {
    /// The built-in matrix: CPython 3.11 to 3.14 on macOS (universal2),
    /// glibc Linux (`x86_64`, `aarch64`) and Windows (amd64, arm64).
    pub fn builtin() -> Self {
        let runtimes = ["cp311", "cp312", "cp313", "cp314"]
            .iter()
            .map(|tag| RuntimeTag {
                tag: (*tag).to_string(),
                abis: vec![(*tag).to_string()],
            })
            .collect();

        let os = vec![
            OsFamily {
                name: "darwin".to_string(),
                platforms: strings(&["macosx"]),
                arches: strings(&["universal2"]),
            },
            OsFamily {
                name: "linux-gnu".to_string(),
                // only versioned, don't care about older ones
                platforms: strings(&["manylinux"]),
                arches: strings(&["x86_64", "aarch64"]),
            },
            OsFamily {
                name: "win".to_string(),
                platforms: strings(&["win"]),
                arches: strings(&["amd64", "arm64"]),
            },
        ];

        Self { runtimes, os }
    }

    /// Check that no list is empty and every name is path-safe.
    ///
    /// An empty list would make the generated installer unusable, so this
    /// runs before any network or filesystem access.
    ///
    /// # Errors
    ///
    /// Returns [`MatrixError::Missing`] for empty tables and
    /// [`MatrixError::UnsafeName`] for names containing path characters.
    pub fn validate(&self) -> Result<(), MatrixError> {
        if self.runtimes.is_empty() || self.runtimes.iter().any(|r| r.abis.is_empty()) {
            return Err(MatrixError::Missing("abi"));
        }
        if self.os.is_empty() || self.os.iter().any(|o| o.platforms.is_empty()) {
            return Err(MatrixError::Missing("platform"));
        }
        if self.os.iter().any(|o| o.arches.is_empty()) {
            return Err(MatrixError::Missing("arch"));
        }

        let check = |what: &'static str, value: &str| {
            if is_safe_name(value) && !value.is_empty() {
                Ok(())
            } else {
                Err(MatrixError::UnsafeName {
                    what,
                    value: value.to_string(),
                })
            }
        };

        for runtime in &self.runtimes {
            check("python version", &runtime.tag)?;
            for abi in &runtime.abis {
                check("python tag", abi)?;
            }
        }
        for family in &self.os {
            check("os identifier", &family.name)?;
            for platform in &family.platforms {
                check("platform", platform)?;
            }
            for arch in &family.arches {
                check("arch", arch)?;
            }
        }
        Ok(())
    }

    /// Look up an accepted runtime by tag.
    pub fn runtime(&self, tag: &str) -> Option<&RuntimeTag> {
        self.runtimes.iter().find(|r| r.tag == tag)
    }

    /// Whether `tag` is an accepted runtime tag.
    pub fn accepts_runtime(&self, tag: &str) -> bool {
        self.runtime(tag).is_some()
    }

    /// Whether `abi` is accepted for runtime `runtime`.
    pub fn accepts_abi(&self, runtime: &str, abi: &str) -> bool {
        self.runtime(runtime)
            .is_some_and(|r| r.abis.iter().any(|a| a == abi))
    }

    /// Look up an OS family by name.
    pub fn os_family(&self, name: &str) -> Option<&OsFamily> {
        self.os.iter().find(|o| o.name == name)
    }

    /// Whether the `(os, arch)` pairing is declared.
    pub fn supports(&self, os: &str, arch: &str) -> bool {
        self.os_family(os)
            .is_some_and(|o| o.arches.iter().any(|a| a == arch))
    }

    /// Whether every component of `cell` is declared and consistent.
    pub fn contains_cell(&self, cell: &PlatformCell) -> bool {
        self.accepts_abi(&cell.runtime, &cell.abi) && self.supports(&cell.os, &cell.arch)
    }

    /// Classify a wheel platform tag into an `(os, arch)` pairing.
    ///
    /// Finds the first OS family with a prefix `P` such that the tag starts
    /// with `P_`, then the first of that family's architectures `A` such
    /// that the tag ends with `_A`. Returns `None` if nothing matches; such
    /// tags are ignored.
    pub fn classify(&self, platform_tag: &str) -> Option<OsArch> {
        for family in &self.os {
            let prefixed = family.platforms.iter().any(|p| {
                platform_tag
                    .strip_prefix(p.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
            });
            if !prefixed {
                continue;
            }
            let arch = family.arches.iter().find(|a| {
                platform_tag
                    .strip_suffix(a.as_str())
                    .is_some_and(|rest| rest.ends_with('_'))
            });
            if let Some(arch) = arch {
                return Some(OsArch::new(&family.name, arch));
            }
        }
        None
    }

    /// Whether a platform tag is wanted by any OS family.
    pub fn wants_platform(&self, platform_tag: &str) -> bool {
        self.classify(platform_tag).is_some()
    }

    /// All `(os, arch)` pairings in declaration order.
    pub fn pairs(&self) -> Vec<OsArch> {
        self.os
            .iter()
            .flat_map(|o| o.arches.iter().map(|a| OsArch::new(&o.name, a)))
            .collect()
    }

    /// Every cell of the matrix, in declaration order.
    pub fn cells(&self) -> Vec<PlatformCell> {
        let pairs = self.pairs();
        self.runtimes
            .iter()
            .flat_map(|r| r.abis.iter().map(move |abi| (r.tag.as_str(), abi.as_str())))
            .flat_map(|(runtime, abi)| {
                pairs
                    .iter()
                    .map(move |p| PlatformCell::new(runtime, abi, &p.os, &p.arch))
            })
            .collect()
    }
}
