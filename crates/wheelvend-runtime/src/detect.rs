//! Host cell detection.
//!
//! [`detect_cell`] is a pure function from interpreter configuration
//! variables to a [`HostCell`]. [`InterpreterProbe`] collects those
//! variables from a local interpreter; tests implement [`CellDetector`]
//! directly instead.

use std::ffi::OsString;
use std::process::Command;

use serde::Deserialize;
use wheelvend_schema::PlatformCell;

use crate::error::InstallError;

/// Prints the configuration variables we need as a single JSON object.
const PROBE_SCRIPT: &str = r#"import json, platform, sysconfig
v = sysconfig.get_config_var
print(json.dumps({
    "implementation": platform.python_implementation(),
    "py_version_nodot": v("py_version_nodot"),
    "py_version_nodot_plat": v("py_version_nodot_plat"),
    "soabi": v("SOABI"),
    "platform": sysconfig.get_platform(),
    "multiarch": v("MULTIARCH"),
    "ext_suffix": v("EXT_SUFFIX"),
}))"#;

/// Interpreter configuration variables, as reported by `sysconfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SysconfigVars {
    /// `platform.python_implementation()`, e.g. `CPython`.
    pub implementation: String,
    /// `py_version_nodot`, e.g. `312`.
    pub py_version_nodot: Option<String>,
    /// `py_version_nodot_plat`, set on Windows (e.g. `312` or `312-arm64`).
    pub py_version_nodot_plat: Option<String>,
    /// `SOABI`, e.g. `cpython-312-x86_64-linux-gnu`.
    pub soabi: Option<String>,
    /// `sysconfig.get_platform()`, e.g. `linux-x86_64`.
    pub platform: String,
    /// `MULTIARCH`, e.g. `x86_64-linux-gnu` or `darwin`.
    pub multiarch: Option<String>,
    /// `EXT_SUFFIX`, e.g. `.cpython-312-x86_64-linux-gnu.so`.
    pub ext_suffix: Option<String>,
}

/// The detected host: its matrix cell plus what we need to filter files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCell {
    /// Runtime, ABI, OS family and architecture.
    pub cell: PlatformCell,
    /// Lowercase implementation name (`cpython`).
    pub implementation: String,
    /// ABI number without the implementation prefix (`312`).
    pub abi_number: String,
    /// Native extension suffix of the running interpreter.
    pub ext_suffix: Option<String>,
}

impl HostCell {
    /// Glob matching native extensions of *any* ABI on this platform, if
    /// the interpreter's extension suffix follows the convention we expect.
    ///
    /// Files for different ABIs are expected to have non-conflicting names
    /// on every supported platform; matching files whose name does not end
    /// in our own suffix belong to another ABI and need not be installed.
    pub fn suffix_filter(&self) -> Option<glob::Pattern> {
        let ext = self.ext_suffix.as_deref()?;
        let PlatformCell { abi, os, arch, .. } = &self.cell;
        let implementation = &self.implementation;
        let abi_number = &self.abi_number;

        let pattern = match os.as_str() {
            "win" if ext == format!(".{abi}-win_{arch}.pyd") => "*.*-win_*.pyd",
            "darwin" if ext == format!(".{implementation}-{abi_number}-darwin.so") => {
                "*.*-*-darwin.so"
            }
            "linux-gnu" if ext == format!(".{implementation}-{abi_number}-{arch}-linux-gnu.so") => {
                "*.*-*-*-linux-gnu.so"
            }
            _ => return None,
        };
        glob::Pattern::new(pattern).ok()
    }
}

/// Derive the host cell from interpreter configuration variables.
///
/// Uses only the given values; no filesystem or network access.
///
/// # Errors
///
/// Returns [`InstallError::UnsupportedRuntime`] for anything but `CPython`
/// and [`InstallError::Probe`] if a required variable is missing.
pub fn detect_cell(vars: &SysconfigVars) -> Result<HostCell, InstallError> {
    // There is also "py" for pure Python, but we don't vendor those.
    let short = match vars.implementation.as_str() {
        "CPython" => "cp",
        other => return Err(InstallError::UnsupportedRuntime(other.to_string())),
    };

    let nodot = vars
        .py_version_nodot
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| InstallError::Probe("py_version_nodot is not set".to_string()))?;
    let runtime = format!("{short}{nodot}");

    let nodot_plat = vars
        .py_version_nodot_plat
        .as_deref()
        .and_then(|s| s.split('-').next())
        .unwrap_or_default();
    let abi_number = if nodot_plat.is_empty() {
        vars.soabi
            .as_deref()
            .and_then(|s| s.split('-').nth(1))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| InstallError::Probe("SOABI is not set".to_string()))?
    } else {
        nodot_plat
    };
    let abi = format!("{short}{abi_number}");

    // macOS always reports "universal2" here, which is what we vendor
    let arch = vars.platform.rsplit('-').next().unwrap_or_default();
    if arch.is_empty() {
        return Err(InstallError::Probe(format!(
            "Cannot derive architecture from platform '{}'",
            vars.platform
        )));
    }

    // MULTIARCH distinguishes linux-gnu from linux-musl; it is "darwin" on macOS
    let os = match vars.multiarch.as_deref().filter(|s| !s.is_empty()) {
        Some(multiarch) => multiarch.replace(&format!("{arch}-"), ""),
        None => vars.platform.split('-').next().unwrap_or_default().to_string(),
    };

    Ok(HostCell {
        cell: PlatformCell::new(runtime, abi, os, arch),
        implementation: vars.implementation.to_lowercase(),
        abi_number: abi_number.to_string(),
        ext_suffix: vars.ext_suffix.clone(),
    })
}

/// Source of the current host cell.
pub trait CellDetector {
    /// Detect the cell of the runtime that will import the vendored files.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be determined or is unsupported.
    fn detect(&self) -> Result<HostCell, InstallError>;
}

/// Detects the host by asking a local interpreter for its configuration.
#[derive(Debug, Clone)]
pub struct InterpreterProbe {
    program: OsString,
}

impl Default for InterpreterProbe {
    fn default() -> Self {
        let program = if cfg!(windows) { "python" } else { "python3" };
        Self::new(program)
    }
}

impl InterpreterProbe {
    /// Probe the given interpreter executable.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the interpreter and collect its configuration variables.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Probe`] if the interpreter fails or prints
    /// something unexpected.
    pub fn query(&self) -> Result<SysconfigVars, InstallError> {
        let output = Command::new(&self.program)
            .args(["-c", PROBE_SCRIPT])
            .output()?;
        if !output.status.success() {
            return Err(InstallError::Probe(format!(
                "{} exited with {}: {}",
                self.program.to_string_lossy(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| InstallError::Probe(e.to_string()))
    }
}

impl CellDetector for InterpreterProbe {
    fn detect(&self) -> Result<HostCell, InstallError> {
        detect_cell(&self.query()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_vars() -> SysconfigVars {
        SysconfigVars {
            implementation: "CPython".into(),
            py_version_nodot: Some("312".into()),
            py_version_nodot_plat: Some(String::new()),
            soabi: Some("cpython-312-x86_64-linux-gnu".into()),
            platform: "linux-x86_64".into(),
            multiarch: Some("x86_64-linux-gnu".into()),
            ext_suffix: Some(".cpython-312-x86_64-linux-gnu.so".into()),
        }
    }

    #[test]
    fn detects_linux_gnu() {
        let host = detect_cell(&linux_vars()).unwrap();
        assert_eq!(
            host.cell,
            PlatformCell::new("cp312", "cp312", "linux-gnu", "x86_64")
        );
        let filter = host.suffix_filter().unwrap();
        assert!(filter.matches("_cffi_backend.cpython-313-x86_64-linux-gnu.so"));
        assert!(!filter.matches("module.py"));
    }

    #[test]
    fn detects_windows_from_nodot_plat() {
        let vars = SysconfigVars {
            implementation: "CPython".into(),
            py_version_nodot: Some("313".into()),
            py_version_nodot_plat: Some("313-arm64".into()),
            soabi: None,
            platform: "win-arm64".into(),
            multiarch: None,
            ext_suffix: Some(".cp313-win_arm64.pyd".into()),
        };
        let host = detect_cell(&vars).unwrap();
        assert_eq!(host.cell, PlatformCell::new("cp313", "cp313", "win", "arm64"));
        assert!(host.suffix_filter().unwrap().matches("x.cp312-win_arm64.pyd"));
    }

    #[test]
    fn detects_darwin_universal() {
        let vars = SysconfigVars {
            implementation: "CPython".into(),
            py_version_nodot: Some("311".into()),
            py_version_nodot_plat: None,
            soabi: Some("cpython-311-darwin".into()),
            platform: "macosx-10.9-universal2".into(),
            multiarch: Some("darwin".into()),
            ext_suffix: Some(".cpython-311-darwin.so".into()),
        };
        let host = detect_cell(&vars).unwrap();
        assert_eq!(
            host.cell,
            PlatformCell::new("cp311", "cp311", "darwin", "universal2")
        );
        assert!(host.suffix_filter().is_some());
    }

    #[test]
    fn unknown_suffix_disables_filter() {
        let mut vars = linux_vars();
        vars.ext_suffix = Some(".so".into());
        assert!(detect_cell(&vars).unwrap().suffix_filter().is_none());
    }

    #[test]
    fn rejects_pypy() {
        let mut vars = linux_vars();
        vars.implementation = "PyPy".into();
        assert!(matches!(
            detect_cell(&vars),
            Err(InstallError::UnsupportedRuntime(name)) if name == "PyPy"
        ));
    }
}
