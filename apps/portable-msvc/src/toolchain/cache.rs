//! On-disk cache of downloaded payloads.
//!
//! ```text
//! <cache_root>/
//!   3f1c0a9be2d4c870/                 # first 16 hex chars of the payload key
//!     Microsoft.VC...base.vsix
//!   9a0e4b7713cd2f05/
//!     Windows SDK Desktop Headers x64-x86_en-us.msi
//!     0123456789abcdef0123456789abcdef.cab   # cabinets live next to their MSI
//! ```
//!
//! The key is the payload's SHA-256 from the manifest when there is one, so a
//! file is found again even if its URL changes, and the SHA-256 of the URL
//! otherwise. A cached file is trusted if it exists with a nonzero size;
//! downloads only ever appear at these paths through an atomic rename.

use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};

use super::manifest::Payload;
use crate::errors::MsvcError;

/// Length of the directory key, in hex characters.
const KEY_LEN: usize = 16;

/// A download cache rooted at an explicit directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Creates a cache rooted at `root`. Nothing is created on disk yet.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the cache root if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MsvcError::Filesystem`] if the directory cannot be created.
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            MsvcError::filesystem(&self.root, "cannot create cache directory", e)
        })?;
        Ok(())
    }

    /// Returns the deterministic directory key of a payload.
    #[must_use]
    pub fn key(payload: &Payload) -> String {
        let digest = match &payload.sha256 {
            Some(sha256) => sha256.to_ascii_lowercase(),
            None => hex::encode(Sha256::digest(payload.url.as_bytes())),
        };
        digest.chars().take(KEY_LEN).collect()
    }

    /// Returns the canonical cache path of a payload.
    #[must_use]
    pub fn path_for(&self, payload: &Payload) -> PathBuf {
        self.root
            .join(Self::key(payload))
            .join(sanitize_file_name(&payload.file_name))
    }

    /// Returns the path of a file stored next to `owner`, such as the
    /// cabinets of an MSI.
    #[must_use]
    pub fn companion_path(&self, owner: &Payload, file_name: &str) -> PathBuf {
        self.root
            .join(Self::key(owner))
            .join(sanitize_file_name(file_name))
    }

    /// Returns `true` if `path` holds a complete cached download.
    #[must_use]
    pub fn is_cached(path: &Path) -> bool {
        std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() > 0)
    }
}

/// Reduces a manifest-provided name to a single safe path component.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.trim() {
        "" | "." | ".." => "payload".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(url: &str, sha256: Option<&str>) -> Payload {
        Payload {
            file_name: "tools.vsix".to_string(),
            url: url.to_string(),
            sha256: sha256.map(ToString::to_string),
            size: None,
        }
    }

    #[test]
    fn key_prefers_manifest_digest() {
        let digest = "ab".repeat(32);
        let p = payload("https://example.invalid/a", Some(&digest));
        assert_eq!(ArtifactCache::key(&p), "abababababababab");
    }

    #[test]
    fn key_falls_back_to_url_digest() {
        let a = payload("https://example.invalid/a", None);
        let b = payload("https://example.invalid/b", None);
        assert_eq!(ArtifactCache::key(&a).len(), KEY_LEN);
        assert_ne!(ArtifactCache::key(&a), ArtifactCache::key(&b));
        assert_eq!(ArtifactCache::key(&a), ArtifactCache::key(&a.clone()));
    }

    #[test]
    fn key_ignores_url_when_digest_known() {
        let digest = "cd".repeat(32);
        let a = payload("https://mirror-a.invalid/x", Some(&digest));
        let b = payload("https://mirror-b.invalid/y", Some(&digest));
        assert_eq!(ArtifactCache::key(&a), ArtifactCache::key(&b));
    }

    #[test]
    fn path_for_nests_file_under_key() {
        let cache = ArtifactCache::new("/cache");
        let p = payload("https://example.invalid/a", Some(&"01".repeat(32)));
        assert_eq!(
            cache.path_for(&p),
            Path::new("/cache/0101010101010101/tools.vsix")
        );
    }

    #[test]
    fn companion_shares_owner_directory() {
        let cache = ArtifactCache::new("/cache");
        let owner = payload("https://example.invalid/sdk.msi", None);
        let cab = cache.companion_path(&owner, "0123.cab");
        assert_eq!(cab.parent(), cache.path_for(&owner).parent());
    }

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_file_name("../evil"), ".._evil");
        assert_eq!(sanitize_file_name("a\\b/c"), "a_b_c");
        assert_eq!(sanitize_file_name(".."), "payload");
        assert_eq!(sanitize_file_name("  "), "payload");
    }

    #[test]
    fn is_cached_requires_nonempty_file() {
        let dir = std::env::temp_dir().join(format!("pmsvc_test_cache_{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let empty = dir.join("empty.vsix");
        std::fs::write(&empty, b"").unwrap();
        let full = dir.join("full.vsix");
        std::fs::write(&full, b"PK").unwrap();

        assert!(!ArtifactCache::is_cached(&empty));
        assert!(ArtifactCache::is_cached(&full));
        assert!(!ArtifactCache::is_cached(&dir.join("missing.vsix")));
        assert!(!ArtifactCache::is_cached(&dir));

        std::fs::remove_dir_all(&dir).ok();
    }
}
