//! Requirement file parsing.
//!
//! Accepts the pip subset we can honour without a resolver: one requirement
//! per line, optional extras (ignored), version specifiers and `--hash`
//! options. Direct URLs and environment markers are rejected.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use wheelvend_schema::hash::{DEFAULT_ALGO, short_hash};
use wheelvend_schema::{DigestMap, is_safe_name};

use crate::error::VendorError;
use crate::version::VersionSpecifiers;

/// Length of the resolution hash kept in paths and the manifest.
pub const RESOLUTION_HASH_LEN: usize = 12;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)",
        r"\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<rest>.*)$",
    ))
    .expect("requirement regex is valid")
});

/// A single requirement line.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Project name as written.
    pub name: String,
    /// Requested extras. Parsed but not acted upon.
    pub extras: Vec<String>,
    /// Version constraint.
    pub specifiers: VersionSpecifiers,
    /// Pinned digests as `algo:hex`.
    pub hashes: BTreeSet<String>,
}

impl Requirement {
    /// Parse one logical line (continuations already joined, comment removed).
    ///
    /// # Errors
    ///
    /// - [`VendorError::Unsupported`] for direct URLs and markers
    /// - [`VendorError::UnsafeName`] for names unfit for a path component
    /// - [`VendorError::Requirement`] for anything else malformed
    pub fn parse_line(line: &str) -> Result<Self, VendorError> {
        let invalid = |reason: String| VendorError::Requirement {
            line: line.trim().to_string(),
            reason,
        };

        let mut parts = line.split("--hash");
        let spec = parts.next().unwrap_or_default().trim();
        let mut hashes = BTreeSet::new();
        for option in parts {
            let value = option
                .trim()
                .strip_prefix('=')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| invalid("--hash needs a value".into()))?;
            let (algo, digest) = value
                .split_once(':')
                .filter(|(a, d)| !a.is_empty() && !d.is_empty())
                .ok_or_else(|| invalid(format!("hash '{value}' is not algo:hex")))?;
            hashes.insert(format!("{}:{}", algo.to_ascii_lowercase(), digest.to_ascii_lowercase()));
        }

        let caps = NAME_RE
            .captures(spec)
            .ok_or_else(|| invalid("missing project name".into()))?;
        let name = caps["name"].to_string();
        if !is_safe_name(&name) {
            return Err(VendorError::UnsafeName(name));
        }

        let rest = caps["rest"].trim();
        if rest.starts_with('@') {
            return Err(VendorError::Unsupported("URL"));
        }
        if rest.contains(';') {
            return Err(VendorError::Unsupported("Marker"));
        }
        let rest = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(rest);
        let specifiers = VersionSpecifiers::parse(rest).map_err(invalid)?;

        let extras = caps
            .name("extras")
            .map(|e| {
                e.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name,
            extras,
            specifiers,
            hashes,
        })
    }

    /// Algorithms used by the pinned hashes.
    pub fn hash_algos(&self) -> BTreeSet<&str> {
        self.hashes
            .iter()
            .filter_map(|h| h.split_once(':').map(|(algo, _)| algo))
            .collect()
    }

    /// Whether any of an artifact's index digests appears in our pins.
    /// Always true when nothing is pinned.
    pub fn accepts_digests(&self, digests: &DigestMap) -> bool {
        self.hashes.is_empty()
            || digests.iter().any(|(algo, hex)| {
                let pin = format!("{}:{}", algo.to_ascii_lowercase(), hex.to_ascii_lowercase());
                self.hashes.contains(&pin)
            })
    }

    /// The digests to verify a download against: the pinned algorithms, or
    /// sha256 if nothing is pinned.
    pub fn filter_digests(&self, digests: &DigestMap) -> DigestMap {
        let algos = self.hash_algos();
        digests
            .iter()
            .filter(|(algo, _)| {
                if algos.is_empty() {
                    algo.as_str() == DEFAULT_ALGO
                } else {
                    algos.contains(algo.as_str())
                }
            })
            .map(|(a, h)| (a.clone(), h.clone()))
            .collect()
    }
}

/// A parsed `requirements.txt` together with its identity.
#[derive(Debug, Clone)]
pub struct RequirementsFile {
    /// Bundle name: the directory holding the file.
    pub name: String,
    /// Short hash of the normalized file contents.
    pub resolution_hash: String,
    /// Requirements in file order.
    pub requirements: Vec<Requirement>,
}

impl RequirementsFile {
    /// Read and parse `path`.
    ///
    /// # Errors
    ///
    /// Returns I/O errors, [`VendorError::UnsafeName`] if the containing
    /// directory's name is unsafe, [`VendorError::NoRequirements`] if the
    /// file declares nothing, or any requirement parse error.
    pub fn load(path: &Path) -> Result<Self, VendorError> {
        let absolute = std::path::absolute(path)?;
        let name = absolute
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = fs::read_to_string(&absolute)?;
        Self::parse(&name, &text)
    }

    /// Parse requirements `text` for bundle `name`.
    ///
    /// # Errors
    ///
    /// See [`RequirementsFile::load`].
    pub fn parse(name: &str, text: &str) -> Result<Self, VendorError> {
        if name.is_empty() || !is_safe_name(name) {
            return Err(VendorError::UnsafeName(name.to_string()));
        }

        let joined = text.replace("\\\r\n", " ").replace("\\\n", " ");
        let requirements = joined
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(Requirement::parse_line)
            .collect::<Result<Vec<_>, _>>()?;
        if requirements.is_empty() {
            return Err(VendorError::NoRequirements);
        }

        Ok(Self {
            name: name.to_string(),
            resolution_hash: short_hash(joined.as_bytes(), RESOLUTION_HASH_LEN),
            requirements,
        })
    }

    /// Module directory names, in file order.
    pub fn module_names(&self) -> Vec<String> {
        self.requirements.iter().map(|r| r.name.clone()).collect()
    }
}
