//! The install routine run by consumers at first use.
//!
//! Installation copies `<module>/any/any` and `<module>/<os>/<arch>` from the
//! bundle into a per-cell directory in the cache and then prepends that
//! directory to the search path. The marker file is written last, so an
//! interrupted install is simply redone by the next caller.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use wheelvend_schema::{ANY_DIR, CacheRoot, InstallerManifest, MANIFEST_FILE_NAME};

use crate::detect::{CellDetector, HostCell};
use crate::error::InstallError;
use crate::search_path::SearchPath;

/// A loaded bundle, ready to be installed for the current host.
#[derive(Debug, Clone)]
pub struct Installer {
    bundle_root: PathBuf,
    manifest: InstallerManifest,
    cache: CacheRoot,
}

impl Installer {
    /// Load `installer.json` from `bundle_root`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Manifest`] if the manifest is missing or
    /// invalid.
    pub fn load(bundle_root: impl Into<PathBuf>, cache: CacheRoot) -> Result<Self, InstallError> {
        let bundle_root = bundle_root.into();
        let manifest = InstallerManifest::load(&bundle_root.join(MANIFEST_FILE_NAME))?;
        Ok(Self::new(bundle_root, manifest, cache))
    }

    /// Use an already parsed manifest.
    pub fn new(
        bundle_root: impl Into<PathBuf>,
        manifest: InstallerManifest,
        cache: CacheRoot,
    ) -> Self {
        Self {
            bundle_root: bundle_root.into(),
            manifest,
            cache,
        }
    }

    /// The bundle's manifest.
    pub fn manifest(&self) -> &InstallerManifest {
        &self.manifest
    }

    /// Make the bundle importable for the host reported by `detector`.
    ///
    /// Returns the install directory, which is now first in `search_path`.
    /// Safe to call repeatedly and from several processes at once.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::UnsupportedPlatform`] if the host is outside
    /// the bundle's matrix, [`InstallError::Bundle`] if the bundle lacks a
    /// module directory, or I/O errors from copying.
    pub fn install(
        &self,
        detector: &dyn CellDetector,
        search_path: &mut SearchPath,
    ) -> Result<PathBuf, InstallError> {
        let host = detector.detect()?;
        let name = &self.manifest.name;
        let hash = &self.manifest.resolution_hash;
        let cell = &host.cell;

        if !self.manifest.matrix.contains_cell(cell) {
            return Err(InstallError::UnsupportedPlatform {
                cell: cell.to_string(),
                bundle: name.clone(),
            });
        }

        info!(
            "Installing vendored packages for {name} for {}-{} on {}-{}",
            cell.runtime, cell.abi, cell.os, cell.arch
        );

        let install_dir = self.cache.install_dir(name, hash, cell);
        let marker = self.cache.install_marker(name, hash, cell);

        if install_dir.is_dir() && marker.is_file() {
            debug!("{} already installed", install_dir.display());
        } else {
            self.extract(&host, &install_dir)?;
            write_atomic(&marker, &mut io::empty())?;
        }

        search_path.prepend(&install_dir);
        Ok(install_dir)
    }

    fn extract(&self, host: &HostCell, install_dir: &Path) -> Result<(), InstallError> {
        let filter = host.suffix_filter();
        if filter.is_none() {
            warn!("Can not filter files by ext_suffix. May extract more than required!");
        }
        let own_suffix = host.ext_suffix.as_deref().unwrap_or_default();

        let wanted = |file_name: &str| match &filter {
            None => true,
            Some(pattern) => {
                (!own_suffix.is_empty() && file_name.ends_with(own_suffix))
                    || !pattern.matches(file_name)
            }
        };

        fs::create_dir_all(install_dir)?;
        for module in &self.manifest.modules {
            let any_dir = self.bundle_root.join(module).join(ANY_DIR).join(ANY_DIR);
            let platform_dir = self
                .bundle_root
                .join(module)
                .join(&host.cell.os)
                .join(&host.cell.arch);
            for dir in [&any_dir, &platform_dir] {
                if !dir.is_dir() {
                    return Err(InstallError::Bundle(format!(
                        "missing directory {}",
                        dir.display()
                    )));
                }
            }
            // shared files first so platform files take precedence
            copy_tree(&any_dir, install_dir, &wanted)?;
            copy_tree(&platform_dir, install_dir, &wanted)?;
        }
        Ok(())
    }
}

/// Copy every wanted file below `src` into `dest`, keeping relative paths.
fn copy_tree(src: &Path, dest: &Path, wanted: &dyn Fn(&str) -> bool) -> Result<(), InstallError> {
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| InstallError::Bundle(e.to_string()))?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            let file_name = entry.file_name().to_string_lossy();
            if wanted(file_name.as_ref()) {
                let mut source = File::open(entry.path())?;
                write_atomic(&target, &mut source)?;
            }
        }
    }
    Ok(())
}

/// Write `content` to `path` through a temporary file in the same directory.
///
/// Concurrent writers of identical content converge on the same result.
fn write_atomic(path: &Path, content: &mut dyn io::Read) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".wheelvend-")
        .tempfile_in(parent)?;
    io::copy(content, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheelvend_schema::{OsFamily, PlatformCell, PlatformMatrix, RuntimeTag};

    struct FixedHost(HostCell);

    impl CellDetector for FixedHost {
        fn detect(&self) -> Result<HostCell, InstallError> {
            Ok(self.0.clone())
        }
    }

    fn host(os: &str, arch: &str) -> FixedHost {
        FixedHost(HostCell {
            cell: PlatformCell::new("cp312", "cp312", os, arch),
            implementation: "cpython".into(),
            abi_number: "312".into(),
            ext_suffix: Some(format!(".cpython-312-{arch}-{os}.so")),
        })
    }

    fn matrix() -> PlatformMatrix {
        PlatformMatrix {
            runtimes: vec![RuntimeTag {
                tag: "cp312".into(),
                abis: vec!["cp312".into()],
            }],
            os: vec![OsFamily {
                name: "linux-gnu".into(),
                platforms: vec!["manylinux".into()],
                arches: vec!["x86_64".into(), "aarch64".into()],
            }],
        }
    }

    fn write(path: &Path, data: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    /// Bundle with one module "mylib": a shared module file, a shared file
    /// overridden per platform, and extensions for two ABIs.
    fn bundle(root: &Path) -> Installer {
        let m = root.join("mylib");
        write(&m.join("any/any/mylib/__init__.py"), "shared");
        write(&m.join("any/any/mylib/_config.py"), "generic");
        write(&m.join("linux-gnu/x86_64/mylib/_config.py"), "x86_64");
        write(
            &m.join("linux-gnu/x86_64/mylib/_ext.cpython-312-x86_64-linux-gnu.so"),
            "312",
        );
        write(
            &m.join("linux-gnu/x86_64/mylib/_ext.cpython-313-x86_64-linux-gnu.so"),
            "313",
        );
        fs::create_dir_all(m.join("linux-gnu/aarch64")).unwrap();

        let manifest =
            InstallerManifest::new("demo", "hash12345678", vec!["mylib".into()], matrix());
        Installer::new(root, manifest, CacheRoot::new(root.join("cache")))
    }

    fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .map(Result::unwrap)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(dir).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn installs_platform_over_shared_and_filters_other_abis() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = bundle(tmp.path());
        let mut path = SearchPath::new();

        let dir = installer
            .install(&host("linux-gnu", "x86_64"), &mut path)
            .unwrap();

        assert_eq!(fs::read_to_string(dir.join("mylib/__init__.py")).unwrap(), "shared");
        assert_eq!(fs::read_to_string(dir.join("mylib/_config.py")).unwrap(), "x86_64");
        assert!(dir.join("mylib/_ext.cpython-312-x86_64-linux-gnu.so").is_file());
        assert!(!dir.join("mylib/_ext.cpython-313-x86_64-linux-gnu.so").exists());
        assert_eq!(path.entries(), [dir.clone()]);
        assert!(
            tmp.path()
                .join("cache/vendored/demo/hash12345678/linux-gnu-x86_64-cp312-cp312.installed")
                .is_file()
        );
    }

    #[test]
    fn second_install_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = bundle(tmp.path());
        let mut path = SearchPath::new();
        let detector = host("linux-gnu", "x86_64");

        let first = installer.install(&detector, &mut path).unwrap();
        let before = snapshot(&first);
        let second = installer.install(&detector, &mut path).unwrap();

        assert_eq!(first, second);
        assert_eq!(before, snapshot(&second));
        assert_eq!(path.entries().len(), 1);
    }

    #[test]
    fn missing_marker_triggers_reinstall() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = bundle(tmp.path());
        let detector = host("linux-gnu", "x86_64");
        let dir = installer.install(&detector, &mut SearchPath::new()).unwrap();

        fs::remove_file(dir.join("mylib/__init__.py")).unwrap();
        let marker = dir.with_file_name("linux-gnu-x86_64-cp312-cp312.installed");
        fs::remove_file(&marker).unwrap();

        installer.install(&detector, &mut SearchPath::new()).unwrap();
        assert!(dir.join("mylib/__init__.py").is_file());
        assert!(marker.is_file());
    }

    #[test]
    fn rejects_platform_outside_matrix() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = bundle(tmp.path());
        let err = installer
            .install(&host("win", "amd64"), &mut SearchPath::new())
            .unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedPlatform { .. }));
        assert!(err.to_string().contains("demo"));
    }

    #[test]
    fn broken_bundle_leaves_no_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let installer = bundle(tmp.path());
        fs::remove_dir_all(tmp.path().join("mylib/linux-gnu/aarch64")).unwrap();

        let err = installer
            .install(&host("linux-gnu", "aarch64"), &mut SearchPath::new())
            .unwrap_err();
        assert!(matches!(err, InstallError::Bundle(_)));
        assert!(
            !tmp.path()
                .join("cache/vendored/demo/hash12345678/linux-gnu-aarch64-cp312-cp312.installed")
                .exists()
        );
    }
}
