//! Environment setup scripts for the merged tree.
//!
//! Two scripts are written to the output root: `setup.bat` for `cmd.exe` and
//! `setup.ps1` for PowerShell. Both point `PATH`, `INCLUDE` and `LIB` at the
//! merged tree using absolute paths, so they work from any directory.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::arch::Arch;
use crate::errors::MsvcError;

/// File name of the `cmd.exe` script.
pub const BATCH_SCRIPT: &str = "setup.bat";

/// File name of the PowerShell script.
pub const POWERSHELL_SCRIPT: &str = "setup.ps1";

/// What the scripts describe.
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
    /// Installed MSVC version.
    pub msvc_version: &'a str,
    /// Installed SDK version.
    pub sdk_version: &'a str,
    /// Architecture the tools run on.
    pub host: Arch,
    /// Architecture of produced binaries.
    pub target: Arch,
}

/// Directories of the merged tree, relative and `\`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EnvDirs {
    path: Vec<String>,
    include: Vec<String>,
    lib: Vec<String>,
}

impl EnvDirs {
    fn new(host: Arch, target: Arch) -> Self {
        let host_dir = host.host_dir();
        let mut path = vec![format!("bin\\{host_dir}\\{target}")];
        if host != target {
            path.push(format!("bin\\{host_dir}\\{host}"));
        }
        path.push(format!("bin\\{host}"));
        path.push(format!("bin\\{host}\\ucrt"));

        let include = ["", "\\ucrt", "\\shared", "\\um", "\\winrt", "\\cppwinrt"]
            .iter()
            .map(|kit| format!("include{kit}"))
            .collect();

        let lib = vec![
            format!("lib\\{target}"),
            format!("lib\\ucrt\\{target}"),
            format!("lib\\um\\{target}"),
        ];

        Self { path, include, lib }
    }
}

/// Writes `setup.bat` and `setup.ps1` into `destination_root`.
///
/// # Returns
///
/// The paths of the written scripts.
///
/// # Errors
///
/// Returns [`MsvcError::Filesystem`] if the root cannot be resolved or a
/// script cannot be written.
pub fn emit_setup_script(destination_root: &Path, context: &ScriptContext<'_>) -> Result<Vec<PathBuf>> {
    let root = std::path::absolute(destination_root)
        .map_err(|e| MsvcError::filesystem(destination_root, "cannot resolve output path", e))?;
    let root = root.display().to_string();
    let root = root.trim_end_matches(['\\', '/']);
    let dirs = EnvDirs::new(context.host, context.target);

    let scripts = [
        (BATCH_SCRIPT, render_batch(root, &dirs, context)),
        (POWERSHELL_SCRIPT, render_powershell(root, &dirs, context)),
    ];

    let mut written = Vec::with_capacity(scripts.len());
    for (name, content) in scripts {
        let path = destination_root.join(name);
        std::fs::write(&path, content)
            .map_err(|e| MsvcError::filesystem(&path, "cannot write setup script", e))?;
        written.push(path);
    }
    Ok(written)
}

fn render_batch(root: &str, dirs: &EnvDirs, context: &ScriptContext<'_>) -> String {
    let root = root.replace('%', "%%");
    let join = |list: &[String]| {
        list.iter()
            .map(|dir| format!("{root}\\{dir}"))
            .collect::<Vec<_>>()
            .join(";")
    };

    let mut out = String::from("@echo off\r\n");
    out.push_str(&format!("set \"MSVC_VERSION={}\"\r\n", context.msvc_version));
    out.push_str(&format!("set \"SDK_VERSION={}\"\r\n", context.sdk_version));
    out.push_str(&format!("set \"MSVC_HOST={}\"\r\n", context.host.host_dir()));
    out.push_str(&format!("set \"MSVC_ARCH={}\"\r\n", context.target));
    out.push_str(&format!("set \"PATH={};%PATH%\"\r\n", join(&dirs.path)));
    out.push_str(&format!("set \"INCLUDE={}\"\r\n", join(&dirs.include)));
    out.push_str(&format!("set \"LIB={}\"\r\n", join(&dirs.lib)));
    out
}

fn render_powershell(root: &str, dirs: &EnvDirs, context: &ScriptContext<'_>) -> String {
    let root = root.replace('\'', "''");
    let join = |list: &[String]| {
        list.iter()
            .map(|dir| format!("{root}\\{dir}"))
            .collect::<Vec<_>>()
            .join(";")
    };

    let mut out = String::new();
    out.push_str(&format!("$env:MSVC_VERSION = '{}'\r\n", context.msvc_version));
    out.push_str(&format!("$env:SDK_VERSION = '{}'\r\n", context.sdk_version));
    out.push_str(&format!("$env:MSVC_HOST = '{}'\r\n", context.host.host_dir()));
    out.push_str(&format!("$env:MSVC_ARCH = '{}'\r\n", context.target));
    out.push_str(&format!("$env:PATH = '{};' + $env:PATH\r\n", join(&dirs.path)));
    out.push_str(&format!("$env:INCLUDE = '{}'\r\n", join(&dirs.include)));
    out.push_str(&format!("$env:LIB = '{}'\r\n", join(&dirs.lib)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(host: Arch, target: Arch) -> ScriptContext<'static> {
        ScriptContext {
            msvc_version: "14.32.17.2",
            sdk_version: "10.0.22621",
            host,
            target,
        }
    }

    #[test]
    fn native_dirs() {
        let dirs = EnvDirs::new(Arch::X64, Arch::X64);
        assert_eq!(
            dirs.path,
            vec!["bin\\Hostx64\\x64", "bin\\x64", "bin\\x64\\ucrt"]
        );
        assert_eq!(dirs.include.len(), 6);
        assert_eq!(dirs.include[0], "include");
        assert_eq!(dirs.include[3], "include\\um");
        assert_eq!(dirs.lib, vec!["lib\\x64", "lib\\ucrt\\x64", "lib\\um\\x64"]);
    }

    #[test]
    fn cross_dirs_include_native_host_tools() {
        let dirs = EnvDirs::new(Arch::X64, Arch::Arm64);
        assert_eq!(
            dirs.path,
            vec![
                "bin\\Hostx64\\arm64",
                "bin\\Hostx64\\x64",
                "bin\\x64",
                "bin\\x64\\ucrt"
            ]
        );
        assert_eq!(dirs.lib[0], "lib\\arm64");
    }

    #[test]
    fn batch_escapes_percent_in_root() {
        let dirs = EnvDirs::new(Arch::X64, Arch::X64);
        let script = render_batch("C:\\100%\\msvc", &dirs, &context(Arch::X64, Arch::X64));
        assert!(script.starts_with("@echo off\r\n"));
        assert!(script.contains("set \"PATH=C:\\100%%\\msvc\\bin\\Hostx64\\x64;"));
        assert!(script.contains(";%PATH%\"\r\n"));
        assert!(script.contains("set \"LIB=C:\\100%%\\msvc\\lib\\x64;"));
        assert!(script.contains("set \"MSVC_VERSION=14.32.17.2\""));
    }

    #[test]
    fn powershell_escapes_quotes_in_root() {
        let dirs = EnvDirs::new(Arch::X64, Arch::X64);
        let script = render_powershell("C:\\it's\\msvc", &dirs, &context(Arch::X64, Arch::X64));
        assert!(script.contains("$env:INCLUDE = 'C:\\it''s\\msvc\\include;"));
        assert!(script.contains("' + $env:PATH\r\n"));
        assert!(script.contains("$env:SDK_VERSION = '10.0.22621'"));
    }

    #[test]
    fn emit_writes_both_scripts_with_absolute_root() {
        let root = std::env::temp_dir().join(format!("pmsvc_test_script_{}", rand::random::<u64>()));
        std::fs::create_dir_all(&root).unwrap();

        let written = emit_setup_script(&root, &context(Arch::X64, Arch::X64)).unwrap();

        assert_eq!(written.len(), 2);
        let batch = std::fs::read_to_string(root.join(BATCH_SCRIPT)).unwrap();
        assert!(batch.contains(&root.display().to_string()));
        assert!(root.join(POWERSHELL_SCRIPT).is_file());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn emit_into_missing_directory_is_filesystem_error() {
        let root = std::env::temp_dir()
            .join(format!("pmsvc_test_script_{}", rand::random::<u64>()))
            .join("missing");
        let err = emit_setup_script(&root, &context(Arch::X64, Arch::X64)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MsvcError>(),
            Some(MsvcError::Filesystem { .. })
        ));
    }
}
