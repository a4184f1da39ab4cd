//! Version identifiers and version selection.
//!
//! MSVC and SDK versions are dotted numeric tuples (`14.32.17.2`,
//! `10.0.22621`). They are compared component by component as integers, so
//! `14.9` sorts below `14.10`.

use std::cmp::Ordering;
use std::fmt;

use anyhow::Result;

use super::manifest::{Channel, Manifest, ManifestEntry};
use crate::errors::MsvcError;

/// Keyword selecting the newest version of a channel.
pub const LATEST: &str = "latest";

/// Maximum number of close matches listed when a version is not found.
const MAX_SUGGESTIONS: usize = 5;

/// A parsed dotted numeric version identifier.
///
/// The original spelling is kept for display and exact matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionId {
    raw: String,
    parts: Vec<u64>,
}

impl VersionId {
    /// Parses a dotted numeric identifier.
    ///
    /// Returns `None` if any component is empty or not a decimal integer.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let parts = raw
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    part.parse::<u64>().ok()
                }
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self {
            raw: raw.to_string(),
            parts,
        })
    }

    /// Returns the identifier as written in the manifest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the numeric components.
    #[must_use]
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Returns the first `n` components joined with dots, e.g. `14.32`.
    #[must_use]
    pub fn prefix(&self, n: usize) -> String {
        self.parts
            .iter()
            .take(n)
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .cmp(&other.parts)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Picks one version from a channel of the manifest.
///
/// `None` and `"latest"` select the numerically greatest identifier. Any
/// other value must match exactly one entry, either by its identifier or by
/// one of its aliases (`14.32` for `14.32.17.2`, `22621` for `10.0.22621`).
/// An exact identifier match wins over alias matches.
///
/// # Errors
///
/// Returns [`MsvcError::NotFound`] if the channel is empty, nothing matches,
/// or an alias matches more than one entry.
pub fn select_version(
    manifest: &Manifest,
    channel: Channel,
    requested: Option<&str>,
) -> Result<VersionId> {
    let entries = manifest.entries(channel);
    let requested = requested.map(str::trim).filter(|r| !r.is_empty());

    let Some(requested) = requested.filter(|r| !r.eq_ignore_ascii_case(LATEST)) else {
        return entries
            .iter()
            .map(|entry| &entry.version)
            .max()
            .cloned()
            .ok_or_else(|| MsvcError::not_found(channel.to_string(), LATEST, &[]).into());
    };

    if let Some(entry) = entries.iter().find(|e| e.version.as_str() == requested) {
        return Ok(entry.version.clone());
    }

    let by_alias: Vec<&ManifestEntry> = entries
        .iter()
        .filter(|e| e.aliases.iter().any(|a| a == requested))
        .collect();

    match by_alias.as_slice() {
        [entry] => Ok(entry.version.clone()),
        [] => Err(MsvcError::not_found(
            channel.to_string(),
            requested,
            &closest_matches(entries, requested),
        )
        .into()),
        ambiguous => {
            let mut candidates: Vec<&VersionId> = ambiguous.iter().map(|e| &e.version).collect();
            candidates.sort_unstable_by(|a, b| b.cmp(a));
            let candidates: Vec<String> = candidates.iter().map(ToString::to_string).collect();
            Err(MsvcError::not_found(channel.to_string(), requested, &candidates).into())
        }
    }
}

/// Returns up to five identifiers sharing the longest numeric prefix with
/// `requested`, newest first.
fn closest_matches(entries: &[ManifestEntry], requested: &str) -> Vec<String> {
    let wanted: Vec<Option<u64>> = requested.split('.').map(|p| p.parse().ok()).collect();

    let shared = |version: &VersionId| {
        version
            .parts()
            .iter()
            .zip(&wanted)
            .take_while(|(have, want)| Some(**have) == **want)
            .count()
    };

    let mut scored: Vec<(usize, &VersionId)> = entries
        .iter()
        .map(|e| (shared(&e.version), &e.version))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|(sa, va), (sb, vb)| sb.cmp(sa).then_with(|| vb.cmp(va)));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, v)| v.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> VersionId {
        VersionId::parse(raw).expect("valid version")
    }

    fn manifest_with(channel: Channel, versions: &[(&str, &[&str])]) -> Manifest {
        let entries = versions
            .iter()
            .map(|(raw, aliases)| ManifestEntry {
                version: v(raw),
                aliases: aliases.iter().map(ToString::to_string).collect(),
                packages: Vec::new(),
                cabinets: Vec::new(),
            })
            .collect();
        let mut manifest = Manifest::default();
        manifest.insert_entries(channel, entries);
        manifest
    }

    #[test]
    fn parse_rejects_non_numeric() {
        assert!(VersionId::parse("tools").is_none());
        assert!(VersionId::parse("14..2").is_none());
        assert!(VersionId::parse("14.3a").is_none());
        assert!(VersionId::parse("").is_none());
        assert!(VersionId::parse("-1.0").is_none());
    }

    #[test]
    fn ordering_is_numeric_not_lexicographic() {
        assert!(v("14.9") < v("14.10"));
        assert!(v("14.9.0") < v("14.10.0"));
        assert!(v("10.0.19041") < v("10.0.22621"));
        assert!(v("14.2.5") < v("14.9.0"));
    }

    #[test]
    fn shorter_prefix_sorts_first() {
        assert!(v("14.32") < v("14.32.17"));
    }

    #[test]
    fn prefix_joins_leading_parts() {
        assert_eq!(v("14.32.17.2").prefix(2), "14.32");
        assert_eq!(v("14").prefix(2), "14");
    }

    #[test]
    fn latest_picks_numeric_maximum_regardless_of_order() {
        let manifest = manifest_with(
            Channel::Msvc,
            &[("14.9.0", &[]), ("14.10.0", &[]), ("14.2.5", &[])],
        );
        let picked = select_version(&manifest, Channel::Msvc, Some("latest")).unwrap();
        assert_eq!(picked.as_str(), "14.10.0");
        let picked = select_version(&manifest, Channel::Msvc, None).unwrap();
        assert_eq!(picked.as_str(), "14.10.0");
    }

    #[test]
    fn latest_is_deterministic_across_orderings() {
        let forward = manifest_with(Channel::Sdk, &[("10.0.19041", &[]), ("10.0.22621", &[])]);
        let backward = manifest_with(Channel::Sdk, &[("10.0.22621", &[]), ("10.0.19041", &[])]);
        assert_eq!(
            select_version(&forward, Channel::Sdk, None).unwrap(),
            select_version(&backward, Channel::Sdk, None).unwrap()
        );
    }

    #[test]
    fn exact_identifier_matches() {
        let manifest = manifest_with(Channel::Msvc, &[("14.32.17.2", &["14.32"])]);
        let picked = select_version(&manifest, Channel::Msvc, Some("14.32.17.2")).unwrap();
        assert_eq!(picked.as_str(), "14.32.17.2");
    }

    #[test]
    fn alias_matches() {
        let manifest = manifest_with(
            Channel::Sdk,
            &[("10.0.22621", &["22621"]), ("10.0.19041", &["19041"])],
        );
        let picked = select_version(&manifest, Channel::Sdk, Some("22621")).unwrap();
        assert_eq!(picked.as_str(), "10.0.22621");
    }

    #[test]
    fn ambiguous_alias_is_not_found() {
        let manifest = manifest_with(
            Channel::Msvc,
            &[("14.29.16.10", &["14.29"]), ("14.29.16.11", &["14.29"])],
        );
        let err = select_version(&manifest, Channel::Msvc, Some("14.29")).unwrap_err();
        let err = err.downcast_ref::<MsvcError>().unwrap();
        assert!(matches!(err, MsvcError::NotFound { .. }));
        assert!(err.to_string().contains("14.29.16.11, 14.29.16.10"));
    }

    #[test]
    fn missing_version_lists_close_matches() {
        let manifest = manifest_with(
            Channel::Msvc,
            &[("14.32.17.2", &[]), ("14.30.17.0", &[]), ("15.0.1", &[])],
        );
        let err = select_version(&manifest, Channel::Msvc, Some("14.31")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("MSVC version not found: 14.31"));
        assert!(message.contains("14.32.17.2"));
        assert!(!message.contains("15.0.1"));
    }

    #[test]
    fn empty_channel_is_not_found() {
        let manifest = Manifest::default();
        let err = select_version(&manifest, Channel::Sdk, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MsvcError>(),
            Some(MsvcError::NotFound { .. })
        ));
    }
}
