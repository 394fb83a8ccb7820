//! Content digests for vendored files.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256, Sha384, Sha512};
use thiserror::Error;

/// Map of digest algorithm name to lowercase hex digest, as published by the
/// index (`{"sha256": "…"}`).
///
/// A `BTreeMap` keeps iteration order stable, which keeps error messages and
/// serialized output deterministic.
pub type DigestMap = BTreeMap<String, String>;

/// The algorithm used when the caller did not pin any hashes.
pub const DEFAULT_ALGO: &str = "sha256";

/// Errors raised while verifying content against a [`DigestMap`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DigestError {
    /// The digest map was empty or contained an empty key.
    #[error("hashes must be in the form {{algo: hex_digest}} and can't be empty")]
    Empty,

    /// The algorithm is not one we can compute.
    #[error("Unsupported digest algorithm: {0}")]
    Unsupported(String),

    /// The content does not hash to the expected value.
    #[error("{algo} hash mismatch for {subject}: expected {expected}, got {actual}")]
    Mismatch {
        /// Algorithm that failed.
        algo: String,
        /// What was being verified (usually a URL).
        subject: String,
        /// Digest from the index.
        expected: String,
        /// Digest of the bytes we have.
        actual: String,
    },
}

/// Digest algorithms that can be verified locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgo {
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgo {
    /// Name as used by the index and in `--hash=` options.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Compute the lowercase hex digest of `data`.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha384 => hex::encode(Sha384::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

impl std::fmt::Display for DigestAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DigestAlgo {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(DigestError::Unsupported(s.to_string())),
        }
    }
}

/// Verify `data` against every entry of `digests`.
///
/// Every listed algorithm must match; there is no "informative" entry.
/// `subject` only shows up in the error message.
///
/// # Errors
///
/// Returns [`DigestError::Empty`] if there is nothing to verify against,
/// [`DigestError::Unsupported`] for unknown algorithms and
/// [`DigestError::Mismatch`] on the first mismatch.
pub fn verify(data: &[u8], digests: &DigestMap, subject: &str) -> Result<(), DigestError> {
    if digests.is_empty() || digests.keys().any(String::is_empty) {
        return Err(DigestError::Empty);
    }
    for (algo, expected) in digests {
        let actual = algo.parse::<DigestAlgo>()?.hex_digest(data);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(DigestError::Mismatch {
                algo: algo.clone(),
                subject: subject.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
    }
    Ok(())
}

/// URL-safe, unpadded base64 of the SHA-256 of `data`.
///
/// Used for cache file names and the resolution hash; safe as a single path
/// component on every platform.
pub fn url_safe_sha256(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(data))
}

/// The first `len` characters of [`url_safe_sha256`].
pub fn short_hash(data: &[u8], len: usize) -> String {
    let mut full = url_safe_sha256(data);
    full.truncate(len);
    full
}
