//! Error types for the portable-msvc CLI.
//!
//! Every failure that ends a run is reported through [`MsvcError`]. Functions
//! return `anyhow::Result` and raise these variants with `.into()`, so `main`
//! can recover the variant with `downcast_ref` and map it to an exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Consolidated error type for portable-msvc operations.
///
/// Each variant names the identifier, URL or path that caused the failure so
/// the message printed on exit is actionable on its own.
#[derive(Debug, Error)]
pub enum MsvcError {
    /// The manifest endpoint or a payload URL could not be reached, or
    /// answered with a non-success status.
    #[error("network error: {message}: {url}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// A manifest document did not have the expected structure.
    #[error("parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
    },

    /// The requested version is not advertised by the manifest.
    #[error("{channel} version not found: {requested}{hint}")]
    NotFound {
        /// Channel display name (`MSVC` or `Windows SDK`).
        channel: String,
        /// The identifier the user asked for.
        requested: String,
        /// Pre-rendered list of close matches, empty when there are none.
        hint: String,
    },

    /// A required package category resolved to nothing.
    #[error("no packages found for required category {category} (MSVC {msvc}, SDK {sdk})")]
    NoPackagesFound {
        /// The empty category.
        category: String,
        /// Selected MSVC version.
        msvc: String,
        /// Selected SDK version.
        sdk: String,
    },

    /// A package payload could not be downloaded.
    #[error("download error: {message}: {url}")]
    Download {
        /// The payload URL.
        url: String,
        /// Description of the failure.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A downloaded payload does not match the digest from the manifest.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        /// The file that was verified.
        path: PathBuf,
        /// The expected checksum.
        expected: String,
        /// The actual checksum.
        actual: String,
    },

    /// The vendor license was not accepted with `--accept-license`.
    #[error(
        "license not accepted: rerun with --accept-license to accept the Visual Studio license terms"
    )]
    LicenseNotAccepted,

    /// Writing to the destination tree or cache failed.
    #[error("filesystem error: {message}: {}", .path.display())]
    Filesystem {
        /// The path being written.
        path: PathBuf,
        /// Description of the operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A payload archive could not be unpacked.
    #[error("extraction error: {message}: {}", .archive.display())]
    Extraction {
        /// The archive being unpacked.
        archive: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Two packages wrote different content to the same destination.
    #[error(
        "merge conflict: {} written by both {first} and {second} with different content",
        .path.display()
    )]
    MergeConflict {
        /// Destination path relative to the output root.
        path: PathBuf,
        /// Package that wrote the file first.
        first: String,
        /// Package whose write collided.
        second: String,
    },

    /// Invalid command line arguments.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of what was invalid.
        message: String,
    },
}

impl MsvcError {
    /// Creates a new `Network` error.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error listing `suggestions` as close matches.
    #[must_use]
    pub fn not_found(
        channel: impl Into<String>,
        requested: impl Into<String>,
        suggestions: &[String],
    ) -> Self {
        let hint = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" (did you mean: {}?)", suggestions.join(", "))
        };
        Self::NotFound {
            channel: channel.into(),
            requested: requested.into(),
            hint,
        }
    }

    /// Creates a new `NoPackagesFound` error.
    #[must_use]
    pub fn no_packages_found(
        category: impl Into<String>,
        msvc: impl Into<String>,
        sdk: impl Into<String>,
    ) -> Self {
        Self::NoPackagesFound {
            category: category.into(),
            msvc: msvc.into(),
            sdk: sdk.into(),
        }
    }

    /// Creates a new `Download` error.
    #[must_use]
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Download` error with a source error.
    #[must_use]
    pub fn download_with_source(
        url: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new `ChecksumMismatch` error.
    #[must_use]
    pub fn checksum_mismatch(
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `Filesystem` error from an I/O error.
    #[must_use]
    pub fn filesystem(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Filesystem {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Creates a new `Extraction` error.
    #[must_use]
    pub fn extraction(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Creates a new `MergeConflict` error.
    #[must_use]
    pub fn merge_conflict(
        path: impl Into<PathBuf>,
        first: impl Into<String>,
        second: impl Into<String>,
    ) -> Self {
        Self::MergeConflict {
            path: path.into(),
            first: first.into(),
            second: second.into(),
        }
    }

    /// Creates a new `InvalidArguments` error.
    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Returns the process exit code reported for this error.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 2 | network or manifest failure, invalid arguments |
    /// | 3 | requested version not found |
    /// | 4 | license not accepted |
    /// | 5 | filesystem, extraction or merge failure |
    /// | 6 | download or checksum failure |
    /// | 7 | a required package category is empty |
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Network { .. } | Self::Parse { .. } | Self::InvalidArguments { .. } => 2,
            Self::NotFound { .. } => 3,
            Self::LicenseNotAccepted => 4,
            Self::Filesystem { .. } | Self::Extraction { .. } | Self::MergeConflict { .. } => 5,
            Self::Download { .. } | Self::ChecksumMismatch { .. } => 6,
            Self::NoPackagesFound { .. } => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_displays_url() {
        let err = MsvcError::network("https://aka.ms/vs/17/release/channel", "HTTP 503");
        assert_eq!(
            err.to_string(),
            "network error: HTTP 503: https://aka.ms/vs/17/release/channel"
        );
    }

    #[test]
    fn not_found_without_suggestions_has_no_hint() {
        let err = MsvcError::not_found("MSVC", "14.99", &[]);
        assert_eq!(err.to_string(), "MSVC version not found: 14.99");
    }

    #[test]
    fn not_found_lists_suggestions() {
        let err = MsvcError::not_found(
            "MSVC",
            "14.3",
            &["14.32.17.2".to_string(), "14.30.17.0".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "MSVC version not found: 14.3 (did you mean: 14.32.17.2, 14.30.17.0?)"
        );
    }

    #[test]
    fn checksum_mismatch_displays_both_values() {
        let err = MsvcError::checksum_mismatch("cache/a.vsix", "abc123", "def456");
        assert_eq!(
            err.to_string(),
            "checksum mismatch for cache/a.vsix: expected abc123, got def456"
        );
    }

    #[test]
    fn merge_conflict_names_both_packages() {
        let err = MsvcError::merge_conflict("include/a.h", "crt-headers", "sdk-headers");
        assert_eq!(
            err.to_string(),
            "merge conflict: include/a.h written by both crt-headers and sdk-headers with different content"
        );
    }

    #[test]
    fn license_not_accepted_mentions_flag() {
        assert!(
            MsvcError::LicenseNotAccepted
                .to_string()
                .contains("--accept-license")
        );
    }

    #[test]
    fn exit_codes_distinguish_failure_classes() {
        let codes = [
            MsvcError::network("u", "m").exit_code(),
            MsvcError::not_found("MSVC", "1", &[]).exit_code(),
            MsvcError::LicenseNotAccepted.exit_code(),
            MsvcError::extraction("a.zip", "bad").exit_code(),
            MsvcError::download("u", "m").exit_code(),
            MsvcError::no_packages_found("Toolset", "14.3", "22621").exit_code(),
        ];
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|&c| c != 0 && c != 1));
    }
}
