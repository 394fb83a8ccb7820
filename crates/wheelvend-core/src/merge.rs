//! Folding identical per-platform files into `any/any`.
//!
//! After every platform of a package has been extracted, files that exist
//! with the same content under every `<os>/<arch>` folder are moved to the
//! shared `any/any` folder. Installing a cell copies `any/any` and then its
//! own folder, which reproduces the extracted tree of that cell.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use wheelvend_schema::{ANY_DIR, OsArch};

use crate::error::VendorError;

/// Whether a relative path is compared with line endings normalised.
///
/// License files are the only text we expect to differ in line endings
/// between platform builds.
pub fn is_probably_text(rel: &Path) -> bool {
    let mut parent = rel.components().rev().skip(1);
    let Some(licenses) = parent.next() else {
        return false;
    };
    let Some(dist_info) = parent.next() else {
        return false;
    };
    licenses.as_os_str() == "licenses"
        && dist_info
            .as_os_str()
            .to_string_lossy()
            .ends_with(".dist-info")
}

fn normalise(data: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.into_iter().peekable();
    while let Some(b) = iter.next() {
        if b == b'\r' && iter.peek() == Some(&b'\n') {
            continue;
        }
        out.push(b);
    }
    out
}

/// Compare two files byte for byte (or text-normalised).
///
/// Returns `missing_result` if either file does not exist.
pub fn is_file_identical(
    a: &Path,
    b: &Path,
    as_text: bool,
    missing_result: bool,
) -> io::Result<bool> {
    let read = |p: &Path| match fs::read(p) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    };
    let (Some(left), Some(right)) = (read(a)?, read(b)?) else {
        return Ok(missing_result);
    };
    if as_text {
        Ok(normalise(left) == normalise(right))
    } else {
        Ok(left == right)
    }
}

/// What a merge did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Relative paths moved to `any/any`.
    pub moved: Vec<PathBuf>,
    /// Directories removed because they held no files.
    pub pruned: usize,
}

/// Merge the platform folders of `pkg_dir` into `pkg_dir/any/any`.
///
/// `pairs` are the matrix pairs in declaration order; the first is the
/// reference. With fewer than two pairs nothing is merged, but `any/any`
/// is still created and empty directories are pruned.
pub fn merge_platforms(pkg_dir: &Path, pairs: &[OsArch]) -> Result<MergeReport, VendorError> {
    let any_dir = pkg_dir.join(ANY_DIR).join(ANY_DIR);
    fs::create_dir_all(&any_dir)?;
    let mut report = MergeReport::default();

    let pair_dir = |p: &OsArch| pkg_dir.join(&p.os).join(&p.arch);

    if let [reference, others @ ..] = pairs {
        let ref_dir = pair_dir(reference);
        let mut candidates = Vec::new();
        for entry in WalkDir::new(&ref_dir).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                if let Ok(rel) = entry.path().strip_prefix(&ref_dir) {
                    candidates.push(rel.to_path_buf());
                }
            }
        }

        // a single pair has nothing to compare against
        if others.is_empty() {
            candidates.clear();
        }

        for rel in candidates {
            let as_text = is_probably_text(&rel);
            let mut identical = true;
            for other in others {
                let sibling = pair_dir(other).join(&rel);
                if !is_file_identical(&ref_dir.join(&rel), &sibling, as_text, false)? {
                    identical = false;
                    break;
                }
            }
            if !identical {
                continue;
            }

            let target = any_dir.join(&rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(ref_dir.join(&rel), &target)?;
            for other in others {
                fs::remove_file(pair_dir(other).join(&rel))?;
            }
            debug!("Merged {}", rel.display());
            report.moved.push(rel);
        }
    }

    for pair in pairs {
        let dir = pair_dir(pair);
        if dir.is_dir() {
            report.pruned += prune_empty_dirs(&dir)?;
        }
    }
    Ok(report)
}

/// Remove every directory below `dir` that (recursively) holds no files.
/// `dir` itself is kept. Returns the number of directories removed.
pub fn prune_empty_dirs(dir: &Path) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        removed += prune_empty_dirs(&path)?;
        if fs::read_dir(&path)?.next().is_none() {
            fs::remove_dir(&path)?;
            debug!("Pruned {}", path.display());
            removed += 1;
        }
    }
    Ok(removed)
}
