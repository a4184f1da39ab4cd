//! Lists the MSVC and Windows SDK versions offered by the manifest.
//!
//! ## Output Format
//!
//! ```text
//! MSVC versions: 14.29.16.11 14.30.17.0 14.32.17.2 14.40.17.10
//! Windows SDK versions: 10.0.19041 10.0.22000 10.0.22621
//! ```
//!
//! Identifiers are listed in ascending numeric order. No license acceptance
//! is needed since nothing is downloaded besides the manifest.

use anyhow::Result;

use crate::toolchain::{Channel, Manifest, fetch_manifest};

/// Executes the show-versions action.
///
/// # Errors
///
/// Returns an error if the manifest cannot be fetched or parsed.
pub async fn execute() -> Result<()> {
    let manifest = fetch_manifest().await?;
    for line in version_lines(&manifest) {
        println!("{line}");
    }
    Ok(())
}

fn version_lines(manifest: &Manifest) -> [String; 2] {
    let line = |label: &str, channel: Channel| {
        let versions: Vec<String> = manifest
            .versions(channel)
            .iter()
            .map(ToString::to_string)
            .collect();
        format!("{label} versions: {}", versions.join(" "))
    };
    [line("MSVC", Channel::Msvc), line("Windows SDK", Channel::Sdk)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::manifest::parse_vs_manifest;
    use crate::toolchain::manifest::test_support::VS_MANIFEST;

    #[test]
    fn lines_list_versions_ascending() {
        let manifest = parse_vs_manifest(VS_MANIFEST, None).unwrap();
        let [msvc, sdk] = version_lines(&manifest);
        assert_eq!(msvc, "MSVC versions: 14.32.17.2");
        assert_eq!(sdk, "Windows SDK versions: 10.0.19041 10.0.22621");
    }

    #[test]
    fn empty_manifest_prints_empty_lines() {
        let [msvc, sdk] = version_lines(&Manifest::default());
        assert_eq!(msvc, "MSVC versions: ");
        assert_eq!(sdk, "Windows SDK versions: ");
    }
}
