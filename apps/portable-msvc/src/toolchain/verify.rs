//! Checksum verification for downloaded payloads.
//!
//! The Visual Studio manifest publishes a SHA-256 for most payloads. Fresh
//! downloads are verified before they are renamed into the cache.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::errors::MsvcError;

/// Verifies that a file matches the expected SHA-256 checksum.
///
/// # Arguments
///
/// * `file_path` - Path to the file to verify
/// * `expected` - Expected SHA-256 hash as a hex string (any case)
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be opened or read
/// - The computed checksum does not match the expected value
///   ([`MsvcError::ChecksumMismatch`])
pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<()> {
    let computed = compute_sha256(file_path)?;

    if computed != expected.to_ascii_lowercase() {
        return Err(MsvcError::checksum_mismatch(file_path, expected, computed).into());
    }

    Ok(())
}

/// Computes the SHA-256 hash of a file.
///
/// # Returns
///
/// The SHA-256 hash as a lowercase hex string.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open file for checksum: {}", file_path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).with_context(|| {
            format!("Failed to read file for checksum: {}", file_path.display())
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

    fn write_hello(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pmsvc_test_{}_{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).expect("Should create temp dir");
        let path = dir.join("hello.txt");
        std::fs::write(&path, b"hello world\n").expect("Should write test content");
        path
    }

    #[test]
    fn compute_sha256_produces_correct_hash() {
        let path = write_hello("sha256");
        assert_eq!(compute_sha256(&path).unwrap(), HELLO_SHA256);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn verify_checksum_accepts_uppercase_expected() {
        let path = write_hello("verify_upper");
        assert!(verify_checksum(&path, &HELLO_SHA256.to_uppercase()).is_ok());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn verify_checksum_mismatch_is_typed() {
        let path = write_hello("verify_fail");
        let err = verify_checksum(&path, &"0".repeat(64)).unwrap_err();
        match err.downcast_ref::<MsvcError>() {
            Some(MsvcError::ChecksumMismatch { actual, .. }) => assert_eq!(actual, HELLO_SHA256),
            other => panic!("Expected ChecksumMismatch, got {other:?}"),
        }
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn compute_sha256_fails_for_nonexistent_file() {
        assert!(compute_sha256(Path::new("/nonexistent/file/path")).is_err());
    }
}
