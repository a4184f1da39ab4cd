//! Windows Installer payloads: SDK `.msi` databases and standalone cabinets.
//!
//! SDK installers are `.msi` databases whose files live in external cabinet
//! files. The cabinets an MSI needs are found by scanning its bytes for
//! `<32 hex chars>.cab` names, which avoids parsing the MSI table format.
//! The debug CRT runtime ships as a plain cabinet of DLLs.
//!
//! Unpacking runs an administrative install (`msiexec /a`) or `expand -F:*`
//! into a staging directory, then copies the files selected by the package
//! rules into the merged tree. Both tools only exist on Windows; elsewhere
//! these payloads fail with [`MsvcError::Extraction`].

use std::path::Path;

use anyhow::Result;
use walkdir::WalkDir;

use super::archive::ExtractStats;
use super::layout::{ExtractRule, map_entry};
use super::merge::MergedTree;
use crate::errors::MsvcError;

/// Length of a cabinet name without the `.cab` extension.
const CAB_NAME_LEN: usize = 32;

/// Returns the cabinet file names referenced by an MSI, in first-seen order.
#[must_use]
pub fn cab_names(msi: &[u8]) -> Vec<String> {
    const EXT: &[u8] = b".cab";

    let mut names: Vec<String> = Vec::new();
    let mut start = CAB_NAME_LEN;
    while start + EXT.len() <= msi.len() {
        let Some(offset) = msi[start..]
            .windows(EXT.len())
            .position(|w| w.eq_ignore_ascii_case(EXT))
        else {
            break;
        };
        let index = start + offset;
        let stem = &msi[index - CAB_NAME_LEN..index];
        if stem.iter().all(u8::is_ascii_alphanumeric) {
            let name = format!("{}.cab", String::from_utf8_lossy(stem));
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
        start = index + EXT.len();
    }
    names
}

/// Windows tools that unpack an installer format into a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unpacker {
    /// `msiexec /a`, an administrative install of an MSI.
    Msiexec,
    /// `expand -F:*`, every file of a cabinet.
    Expand,
}

impl Unpacker {
    fn program(self) -> &'static str {
        match self {
            Self::Msiexec => "msiexec.exe",
            Self::Expand => "expand.exe",
        }
    }

    #[cfg(windows)]
    fn command(self, archive: &Path, staging: &Path) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(self.program());
        match self {
            Self::Msiexec => {
                command
                    .arg("/a")
                    .arg(archive)
                    .args(["/quiet", "/qn"])
                    .arg(format!("TARGETDIR={}", staging.display()));
            }
            Self::Expand => {
                command.arg(archive).arg("-F:*").arg(staging);
            }
        }
        command
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        command
    }
}

/// Unpacks an MSI whose cabinets sit in the same directory.
///
/// # Errors
///
/// Returns [`MsvcError::Extraction`] if `msiexec` is unavailable or fails,
/// and [`MsvcError::Filesystem`] if the staged files cannot be copied.
pub async fn extract_msi(
    msi_path: &Path,
    rules: &[ExtractRule],
    package: &str,
    tree: &mut MergedTree,
) -> Result<ExtractStats> {
    unpack(Unpacker::Msiexec, msi_path, rules, package, tree).await
}

/// Unpacks a standalone cabinet, such as the debug CRT runtime.
///
/// The cabinet's files are staged flat, so `rules` usually place the
/// whole staging directory under one destination.
///
/// # Errors
///
/// Returns [`MsvcError::Extraction`] if `expand` is unavailable or fails,
/// and [`MsvcError::Filesystem`] if the staged files cannot be copied.
pub async fn extract_cab(
    cab_path: &Path,
    rules: &[ExtractRule],
    package: &str,
    tree: &mut MergedTree,
) -> Result<ExtractStats> {
    unpack(Unpacker::Expand, cab_path, rules, package, tree).await
}

#[cfg_attr(not(windows), allow(clippy::unused_async))]
async fn unpack(
    unpacker: Unpacker,
    archive: &Path,
    rules: &[ExtractRule],
    package: &str,
    tree: &mut MergedTree,
) -> Result<ExtractStats> {
    #[cfg(windows)]
    {
        let staging = std::env::temp_dir().join(format!(
            "portable-msvc-stage-{:016x}",
            rand::random::<u64>()
        ));
        std::fs::create_dir_all(&staging)
            .map_err(|e| MsvcError::filesystem(&staging, "cannot create staging directory", e))?;

        let result = run_unpacker(unpacker, archive, &staging)
            .await
            .and_then(|()| collect_staged(&staging, rules, package, tree));
        let _ = std::fs::remove_dir_all(&staging);
        result
    }

    #[cfg(not(windows))]
    {
        let _ = (rules, package, tree);
        Err(MsvcError::extraction(
            archive,
            format!(
                "this payload can only be unpacked on Windows ({} is required)",
                unpacker.program()
            ),
        )
        .into())
    }
}

#[cfg(windows)]
async fn run_unpacker(unpacker: Unpacker, archive: &Path, staging: &Path) -> Result<()> {
    let program = unpacker.program();
    tracing::debug!(archive = %archive.display(), %program, "unpacking");
    let status = unpacker
        .command(archive, staging)
        .status()
        .await
        .map_err(|e| MsvcError::extraction(archive, format!("cannot run {program}: {e}")))?;

    if !status.success() {
        return Err(MsvcError::extraction(
            archive,
            format!("{program} exited with {status}"),
        )
        .into());
    }
    Ok(())
}

/// Copies the staged files that match `rules` into `tree`.
///
/// # Errors
///
/// Returns an error if the staging directory cannot be walked or a file
/// cannot be copied.
pub fn collect_staged(
    staging: &Path,
    rules: &[ExtractRule],
    package: &str,
    tree: &mut MergedTree,
) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();
    for entry in WalkDir::new(staging).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(staging).to_path_buf();
            MsvcError::filesystem(path, "cannot read staged files", e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(staging) else {
            continue;
        };
        let Some(dest) = map_entry(rules, relative) else {
            continue;
        };
        let mut file = std::fs::File::open(entry.path())
            .map_err(|e| MsvcError::filesystem(entry.path(), "cannot open staged file", e))?;
        stats.bytes += tree.write_file(package, &dest, &mut file)?;
        stats.files += 1;
    }
    Ok(stats)
}
