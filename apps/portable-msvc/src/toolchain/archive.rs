//! Extraction of `.vsix` and `.zip` payloads into the merged tree.
//!
//! Only entries matched by one of the package's [`ExtractRule`]s are written.
//! Everything else in the archive (manifests, catalogs, other architectures)
//! is skipped.

use std::path::Path;

use anyhow::Result;
use tracing::trace;

use super::layout::{ExtractRule, map_entry};
use super::merge::MergedTree;
use crate::errors::MsvcError;

/// Totals of one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Files written to the tree.
    pub files: usize,
    /// Bytes written to the tree.
    pub bytes: u64,
}

impl ExtractStats {
    /// Adds another extraction's totals.
    pub fn add(&mut self, other: Self) {
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

/// Extracts the entries of a ZIP archive selected by `rules`.
///
/// # Arguments
///
/// * `archive_path` - The `.vsix` or `.zip` file
/// * `rules` - Extraction rules of the owning package
/// * `package` - Package id, recorded as the writer of each file
/// * `tree` - The merged output tree
///
/// # Errors
///
/// Returns an error if:
/// - The file is not a valid ZIP archive ([`MsvcError::Extraction`])
/// - An entry cannot be decompressed ([`MsvcError::Extraction`])
/// - An output file cannot be written ([`MsvcError::Filesystem`])
pub fn extract_zip(
    archive_path: &Path,
    rules: &[ExtractRule],
    package: &str,
    tree: &mut MergedTree,
) -> Result<ExtractStats> {
    let file = std::fs::File::open(archive_path)
        .map_err(|e| MsvcError::filesystem(archive_path, "cannot open archive", e))?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| MsvcError::extraction(archive_path, format!("not a valid ZIP archive: {e}")))?;

    let mut stats = ExtractStats::default();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| {
            MsvcError::extraction(archive_path, format!("cannot read entry {i}: {e}"))
        })?;

        if entry.is_dir() {
            continue;
        }
        let Some(entry_path) = entry.enclosed_name() else {
            trace!(entry = entry.name(), "skipping entry outside the archive root");
            continue;
        };
        let Some(relative) = map_entry(rules, &entry_path) else {
            continue;
        };

        let bytes = tree.write_file(package, &relative, &mut entry)?;
        stats.files += 1;
        stats.bytes += bytes;
    }

    Ok(stats)
}
