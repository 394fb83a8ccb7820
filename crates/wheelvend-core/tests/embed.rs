//! End-to-end vendoring against an in-memory index, followed by a runtime
//! install of the produced bundle.

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use wheelvend_core::cache::ArtifactCache;
use wheelvend_core::config::VendorConfig;
use wheelvend_core::{Transport, VendorError, Vendorer};
use wheelvend_runtime::{CellDetector, HostCell, InstallError, Installer, SearchPath};
use wheelvend_schema::{
    CacheRoot, DigestAlgo, MANIFEST_FILE_NAME, OsFamily, PlatformCell, PlatformMatrix, RuntimeTag,
};
use zip::write::SimpleFileOptions;

const INDEX: &str = "https://index.example/pypi";
const FILES: &str = "https://files.example";

#[derive(Default)]
struct FakeIndex {
    responses: HashMap<String, Bytes>,
    requests: Mutex<Vec<String>>,
}

impl FakeIndex {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeIndex {
    async fn get(&self, url: &str) -> Result<Bytes, VendorError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| VendorError::Transport(format!("404 {url}")))
    }
}

fn wheel(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn platform_wheel(version: &str, platform: &str) -> Vec<u8> {
    let native = match platform {
        "win_amd64" => "mylib/_ext.cp312-win_amd64.pyd",
        _ => "mylib/_ext.cpython-312-x86_64-linux-gnu.so",
    };
    let metadata = format!("mylib-{version}.dist-info/METADATA");
    let record = format!("mylib-{version}.dist-info/RECORD");
    let wheel_info = format!("mylib-{version}.dist-info/WHEEL");
    wheel(&[
        ("mylib/__init__.py", "from ._ext import *\n"),
        (native, platform),
        (metadata.as_str(), "Name: mylib\n"),
        (record.as_str(), platform),
        (wheel_info.as_str(), platform),
    ])
}

/// A release on the fake index. `advertised` replaces the real digest.
struct FakeRelease {
    version: &'static str,
    platforms: &'static [&'static str],
    yanked: bool,
    advertised: Option<&'static str>,
}

impl FakeRelease {
    fn new(version: &'static str, platforms: &'static [&'static str]) -> Self {
        Self {
            version,
            platforms,
            yanked: false,
            advertised: None,
        }
    }
}

fn wheel_url(version: &str, platform: &str) -> String {
    format!("{FILES}/mylib-{version}-cp312-cp312-{platform}.whl")
}

/// Publish `releases` (oldest first) for `mylib`.
fn publish(releases: &[FakeRelease]) -> FakeIndex {
    let mut index = FakeIndex::default();
    let mut doc = serde_json::Map::new();
    for rel in releases {
        let mut files = Vec::new();
        for platform in rel.platforms {
            let data = platform_wheel(rel.version, platform);
            let url = wheel_url(rel.version, platform);
            let digest = rel
                .advertised
                .map(String::from)
                .unwrap_or_else(|| DigestAlgo::Sha256.hex_digest(&data));
            files.push(json!({
                "filename": format!("mylib-{}-cp312-cp312-{platform}.whl", rel.version),
                "python_version": "cp312",
                "url": url,
                "digests": {"sha256": digest},
                "yanked": rel.yanked,
            }));
            index.responses.insert(url, Bytes::from(data));
        }
        doc.insert(rel.version.to_string(), json!(files));
    }
    let body = serde_json::to_vec(&json!({"info": {"name": "mylib"}, "releases": doc})).unwrap();
    index
        .responses
        .insert(format!("{INDEX}/mylib/json"), Bytes::from(body));
    index
}

fn matrix(pairs: &[(&str, &str, &str)]) -> PlatformMatrix {
    PlatformMatrix {
        runtimes: vec![RuntimeTag {
            tag: "cp312".into(),
            abis: vec!["cp312".into()],
        }],
        os: pairs
            .iter()
            .map(|(os, prefix, arch)| OsFamily {
                name: os.to_string(),
                platforms: vec![prefix.to_string()],
                arches: vec![arch.to_string()],
            })
            .collect(),
    }
}

fn two_platforms() -> PlatformMatrix {
    matrix(&[("linux-gnu", "manylinux", "x86_64"), ("win", "win", "amd64")])
}

struct Project {
    _tmp: tempfile::TempDir,
    requirements: PathBuf,
    cache: CacheRoot,
}

impl Project {
    fn new(requirements: &str) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("demo");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("requirements.txt");
        fs::write(&path, requirements).unwrap();
        let cache = CacheRoot::new(tmp.path().join("cache"));
        Self {
            _tmp: tmp,
            requirements: path,
            cache,
        }
    }

    fn bundle(&self) -> PathBuf {
        self.requirements.parent().unwrap().join("vendored")
    }

    fn vendorer(&self, index: &Arc<FakeIndex>, matrix: PlatformMatrix) -> Vendorer<FakeIndex> {
        let mut config = VendorConfig::new(self.cache.clone());
        config.index_url = INDEX.to_string();
        config.matrix = matrix;
        Vendorer::new(config, Arc::clone(index))
    }
}

struct LinuxHost;

impl CellDetector for LinuxHost {
    fn detect(&self) -> Result<HostCell, InstallError> {
        Ok(HostCell {
            cell: PlatformCell::new("cp312", "cp312", "linux-gnu", "x86_64"),
            implementation: "cpython".into(),
            abi_number: "312".into(),
            ext_suffix: Some(".cpython-312-x86_64-linux-gnu.so".into()),
        })
    }
}

fn files_below(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = walkdir::WalkDir::new(dir)
        .into_iter()
        .map(Result::unwrap)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(dir).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn embed_then_install() {
    let project = Project::new("mylib>=1.0\n");
    let index = Arc::new(publish(&[FakeRelease::new(
        "1.0.0",
        &["manylinux_2_17_x86_64", "win_amd64"],
    )]));
    let vendorer = project.vendorer(&index, two_platforms());

    let outcome = vendorer.embed(&project.requirements).await.unwrap();
    assert_eq!(outcome.manifest.name, "demo");
    assert_eq!(outcome.manifest.modules, ["mylib"]);
    assert_eq!(outcome.manifest_path, project.bundle().join(MANIFEST_FILE_NAME));

    let pkg = project.bundle().join("mylib");
    assert_eq!(
        files_below(&pkg.join("any/any")),
        [
            PathBuf::from("mylib/__init__.py"),
            PathBuf::from("mylib-1.0.0.dist-info/METADATA"),
        ]
    );
    assert_eq!(
        files_below(&pkg.join("linux-gnu/x86_64")),
        [PathBuf::from("mylib/_ext.cpython-312-x86_64-linux-gnu.so")]
    );
    assert_eq!(
        files_below(&pkg.join("win/amd64")),
        [PathBuf::from("mylib/_ext.cp312-win_amd64.pyd")]
    );

    // second run is served from the cache
    let before = index.requests().len();
    let again = vendorer.embed(&project.requirements).await.unwrap();
    assert_eq!(index.requests().len(), before);
    assert_eq!(
        fs::read(&again.manifest_path).unwrap(),
        fs::read(&outcome.manifest_path).unwrap()
    );

    let installer = Installer::load(project.bundle(), project.cache.clone()).unwrap();
    let mut path = SearchPath::new();
    let dir = installer.install(&LinuxHost, &mut path).unwrap();
    assert_eq!(
        files_below(&dir),
        [
            PathBuf::from("mylib/__init__.py"),
            PathBuf::from("mylib/_ext.cpython-312-x86_64-linux-gnu.so"),
            PathBuf::from("mylib-1.0.0.dist-info/METADATA"),
        ]
    );
    assert_eq!(installer.install(&LinuxHost, &mut path).unwrap(), dir);
    assert_eq!(path.entries(), [dir]);
}

#[tokio::test]
async fn digest_mismatch_leaves_nothing_behind() {
    let project = Project::new("mylib==2.0.0\n");
    let mut release = FakeRelease::new("2.0.0", &["win_amd64"]);
    release.advertised = Some("0000000000000000000000000000000000000000000000000000000000000000");
    let index = Arc::new(publish(&[release]));

    fs::create_dir_all(project.bundle()).unwrap();
    fs::write(project.bundle().join(MANIFEST_FILE_NAME), "{}").unwrap();

    let err = project
        .vendorer(&index, matrix(&[("win", "win", "amd64")]))
        .embed(&project.requirements)
        .await
        .unwrap_err();

    assert!(matches!(err, VendorError::Integrity { .. }), "{err}");
    assert!(err.is_integrity());
    let cache = ArtifactCache::new(project.cache.clone());
    assert!(!cache.artifact_path(&wheel_url("2.0.0", "win_amd64")).exists());
    assert!(!project.bundle().join(MANIFEST_FILE_NAME).exists());
}

#[tokio::test]
async fn yanked_release_falls_back_to_older() {
    let both = &["manylinux_2_17_x86_64", "win_amd64"];
    let mut yanked = FakeRelease::new("2.0.0", both);
    yanked.yanked = true;
    let index = Arc::new(publish(&[
        FakeRelease::new("1.0.0", both),
        FakeRelease::new("1.2.0", both),
        FakeRelease::new("1.5.0", &["win_amd64"]),
        yanked,
    ]));

    let project = Project::new("mylib>=1.0.0\n");
    project
        .vendorer(&index, two_platforms())
        .embed(&project.requirements)
        .await
        .unwrap();

    let downloads: Vec<_> = index
        .requests()
        .into_iter()
        .filter(|u| u.ends_with(".whl"))
        .collect();
    assert_eq!(
        downloads,
        [
            wheel_url("1.2.0", "manylinux_2_17_x86_64"),
            wheel_url("1.2.0", "win_amd64"),
        ]
    );
}

#[tokio::test]
async fn only_yanked_releases_fail_resolution() {
    let mut yanked = FakeRelease::new("2.0.0", &["win_amd64"]);
    yanked.yanked = true;
    let index = Arc::new(publish(&[yanked]));

    let project = Project::new("mylib>=1.0.0\n");
    let err = project
        .vendorer(&index, matrix(&[("win", "win", "amd64")]))
        .embed(&project.requirements)
        .await
        .unwrap_err();

    assert!(matches!(err, VendorError::Resolution { .. }));
    assert!(!project.bundle().join(MANIFEST_FILE_NAME).exists());
}

#[tokio::test]
async fn empty_requirements_are_rejected_before_any_request() {
    let project = Project::new("# nothing here\n\n");
    let index = Arc::new(FakeIndex::default());

    let err = project
        .vendorer(&index, two_platforms())
        .embed(&project.requirements)
        .await
        .unwrap_err();

    assert!(matches!(err, VendorError::NoRequirements), "{err}");
    assert!(index.requests().is_empty());
    assert!(!project.bundle().join(MANIFEST_FILE_NAME).exists());
}
