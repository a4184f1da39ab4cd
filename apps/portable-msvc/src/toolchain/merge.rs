//! The merged output tree.
//!
//! All packages extract into one directory. [`MergedTree`] records which
//! package wrote each file and a digest of its content, so a later package
//! overwriting a file with *different* bytes is noticed. Identical rewrites
//! (the same header shipped by two packages) are silent.
//!
//! By default the later write wins and the collision is logged and reported.
//! In strict mode the collision aborts the install with
//! [`MsvcError::MergeConflict`] and the earlier file is left untouched.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::errors::MsvcError;

/// A file written by two packages with different content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// Path relative to the tree root.
    pub path: PathBuf,
    /// Package that wrote the file first.
    pub first: String,
    /// Package that wrote it again.
    pub second: String,
}

#[derive(Debug, Clone)]
struct Origin {
    package: String,
    digest: String,
}

/// Destination directory shared by every package of an install.
#[derive(Debug)]
pub struct MergedTree {
    root: PathBuf,
    strict: bool,
    written: HashMap<PathBuf, Origin>,
    collisions: Vec<Collision>,
}

impl MergedTree {
    /// Creates a tree rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, strict: bool) -> Self {
        Self {
            root: root.into(),
            strict,
            written: HashMap::new(),
            collisions: Vec::new(),
        }
    }

    /// Returns the tree root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the collisions seen so far.
    #[must_use]
    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Returns the number of distinct files written.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.written.len()
    }

    /// Writes the content of `reader` to `relative` on behalf of `package`.
    ///
    /// The content goes to a temporary file beside the destination first and
    /// is renamed into place, so readers never observe a half-written file.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`MsvcError::Filesystem`] if the file cannot be written and
    /// [`MsvcError::MergeConflict`] on a collision in strict mode.
    pub fn write_file(&mut self, package: &str, relative: &Path, reader: &mut impl Read) -> Result<u64> {
        let dest = self.root.join(relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MsvcError::filesystem(parent, "cannot create directory", e))?;
        }

        let temp = temp_path_for(&dest);
        let (bytes, digest) = match write_digested(&temp, reader) {
            Ok(written) => written,
            Err(e) => {
                let _ = std::fs::remove_file(&temp);
                return Err(MsvcError::filesystem(&dest, "cannot write file", e).into());
            }
        };

        if let Some(previous) = self.written.get(relative)
            && previous.package != package
            && previous.digest != digest
        {
            if self.strict {
                let _ = std::fs::remove_file(&temp);
                return Err(
                    MsvcError::merge_conflict(relative, &previous.package, package).into(),
                );
            }
            warn!(
                path = %relative.display(),
                first = %previous.package,
                second = %package,
                "file overwritten with different content"
            );
            self.collisions.push(Collision {
                path: relative.to_path_buf(),
                first: previous.package.clone(),
                second: package.to_string(),
            });
        }

        std::fs::rename(&temp, &dest).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            MsvcError::filesystem(&dest, "cannot move file into place", e)
        })?;

        self.written.insert(
            relative.to_path_buf(),
            Origin {
                package: package.to_string(),
                digest,
            },
        );
        Ok(bytes)
    }
}

/// Hashes everything written through it.
struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn write_digested(path: &Path, reader: &mut impl Read) -> io::Result<(u64, String)> {
    let mut writer = DigestWriter {
        inner: File::create(path)?,
        hasher: Sha256::new(),
    };
    let bytes = io::copy(reader, &mut writer)?;
    writer.flush()?;
    Ok((bytes, hex::encode(writer.hasher.finalize())))
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map_or_else(|| "file".into(), |n| n.to_string_lossy().into_owned());
    dest.with_file_name(format!(".{name}.{:016x}.tmp", rand::random::<u64>()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pmsvc_test_{}_{}", name, rand::random::<u64>()))
    }

    fn write(tree: &mut MergedTree, package: &str, path: &str, content: &[u8]) -> Result<u64> {
        tree.write_file(package, Path::new(path), &mut &content[..])
    }

    #[test]
    fn writes_file_and_creates_parents() {
        let root = temp_root("merge_write");
        let mut tree = MergedTree::new(&root, false);

        let bytes = write(&mut tree, "crt", "include/vcruntime.h", b"#pragma once\n").unwrap();

        assert_eq!(bytes, 13);
        assert_eq!(
            std::fs::read(root.join("include/vcruntime.h")).unwrap(),
            b"#pragma once\n"
        );
        assert_eq!(tree.file_count(), 1);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn identical_content_from_two_packages_is_not_a_collision() {
        let root = temp_root("merge_identical");
        let mut tree = MergedTree::new(&root, true);

        write(&mut tree, "a", "include/shared.h", b"same").unwrap();
        write(&mut tree, "b", "include/shared.h", b"same").unwrap();

        assert!(tree.collisions().is_empty());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn later_write_wins_and_is_recorded() {
        let root = temp_root("merge_lww");
        let mut tree = MergedTree::new(&root, false);

        write(&mut tree, "a", "include/x.h", b"first").unwrap();
        write(&mut tree, "b", "include/x.h", b"second").unwrap();

        assert_eq!(std::fs::read(root.join("include/x.h")).unwrap(), b"second");
        assert_eq!(
            tree.collisions(),
            &[Collision {
                path: PathBuf::from("include/x.h"),
                first: "a".to_string(),
                second: "b".to_string(),
            }]
        );
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn strict_mode_rejects_collision_and_keeps_first() {
        let root = temp_root("merge_strict");
        let mut tree = MergedTree::new(&root, true);

        write(&mut tree, "a", "lib/x64/x.lib", b"first").unwrap();
        let err = write(&mut tree, "b", "lib/x64/x.lib", b"second").unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MsvcError>(),
            Some(MsvcError::MergeConflict { .. })
        ));
        assert_eq!(std::fs::read(root.join("lib/x64/x.lib")).unwrap(), b"first");
        let leftovers = std::fs::read_dir(root.join("lib/x64")).unwrap().count();
        assert_eq!(leftovers, 1, "temporary file must be removed");
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn same_package_may_rewrite_its_own_file() {
        let root = temp_root("merge_self");
        let mut tree = MergedTree::new(&root, true);

        write(&mut tree, "a", "bin/x.dll", b"v1").unwrap();
        write(&mut tree, "a", "bin/x.dll", b"v2").unwrap();

        assert!(tree.collisions().is_empty());
        assert_eq!(std::fs::read(root.join("bin/x.dll")).unwrap(), b"v2");
        std::fs::remove_dir_all(&root).ok();
    }
}
