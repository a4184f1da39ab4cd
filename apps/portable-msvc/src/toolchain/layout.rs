//! Mapping of archive entries onto the merged output tree.
//!
//! Packages lay their files out the way a full Visual Studio installation
//! would (`VC/Tools/MSVC/<version>/bin/Hostx64/x64/cl.exe`,
//! `Windows Kits/10/Include/<version>/um/windows.h`). The merged tree drops the
//! version folders and joins MSVC and SDK content under one `bin`, `include`
//! and `lib`:
//!
//! ```text
//! bin/Hostx64/x64/cl.exe
//! bin/x64/rc.exe
//! include/vcruntime.h
//! include/um/windows.h
//! lib/x64/libcmt.lib
//! lib/um/x64/kernel32.lib
//! ```
//!
//! An [`ExtractRule`] matches the leading segments of an entry path and says
//! where the rest of the path lands. Matching is case-insensitive because the
//! feed is not consistent about casing (`HostX64` vs `Hostx64`).

use std::path::{Component, Path, PathBuf};

use super::arch::Arch;

/// Prefix wrapping the payload inside `.vsix` packages.
pub const VSIX_CONTENTS: &str = "Contents";

/// One segment of an [`ExtractRule`] pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the literal (ignoring case); dropped from the output.
    Literal(String),
    /// Must equal the literal (ignoring case); the literal is written out.
    KeepLiteral(String),
    /// Matches any single segment (a version folder); dropped.
    Any,
    /// Matches any single segment and keeps it as found.
    Keep,
}

/// A prefix rule selecting entries and placing them in the merged tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRule {
    pattern: Vec<Segment>,
    dest: PathBuf,
    exclude: Vec<String>,
}

impl ExtractRule {
    /// Creates a rule from a `/`-separated pattern.
    ///
    /// `*` matches any segment, `{}` matches any segment and keeps it, and
    /// `{name}` matches `name` and keeps it. Anything else is a literal that
    /// is matched and dropped.
    #[must_use]
    pub fn new(pattern: &str, dest: impl AsRef<Path>) -> Self {
        let pattern = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::Any,
                "{}" => Segment::Keep,
                kept if kept.starts_with('{') && kept.ends_with('}') => {
                    Segment::KeepLiteral(kept[1..kept.len() - 1].to_string())
                }
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();
        Self {
            pattern,
            dest: dest.as_ref().to_path_buf(),
            exclude: Vec::new(),
        }
    }

    /// Skips entries whose kept or trailing segments include any of `segments`.
    #[must_use]
    pub fn excluding(mut self, segments: &[&str]) -> Self {
        self.exclude
            .extend(segments.iter().map(|s| s.to_ascii_lowercase()));
        self
    }

    /// Maps an entry path (already split into segments) to its merged location.
    ///
    /// Returns `None` if the rule does not apply, the entry is excluded, or
    /// the path names the matched directory itself rather than something in it.
    #[must_use]
    pub fn apply(&self, segments: &[&str]) -> Option<PathBuf> {
        if segments.len() <= self.pattern.len() {
            return None;
        }

        let mut out = self.dest.clone();
        for (segment, pattern) in segments.iter().zip(&self.pattern) {
            match pattern {
                Segment::Literal(literal) => {
                    if !segment.eq_ignore_ascii_case(literal) {
                        return None;
                    }
                }
                Segment::KeepLiteral(literal) => {
                    if !segment.eq_ignore_ascii_case(literal) {
                        return None;
                    }
                    out.push(literal);
                }
                Segment::Any => {}
                Segment::Keep => {
                    if self.is_excluded(segment) {
                        return None;
                    }
                    out.push(segment);
                }
            }
        }

        let rest = &segments[self.pattern.len()..];
        if rest.iter().any(|s| self.is_excluded(s)) {
            return None;
        }
        out.extend(rest);
        Some(out)
    }

    fn is_excluded(&self, segment: &str) -> bool {
        self.exclude.iter().any(|e| segment.eq_ignore_ascii_case(e))
    }
}

/// Splits an archive entry path into segments, stripping the vsix
/// `Contents/` wrapper.
///
/// Returns `None` for empty paths and for paths that try to leave the
/// extraction root (`..`, absolute paths, drive prefixes).
#[must_use]
pub fn entry_segments(path: &Path) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                // Archives written on Windows may carry backslash separators.
                for piece in part.to_string_lossy().split('\\') {
                    match piece {
                        "" | "." => {}
                        ".." => return None,
                        piece => segments.push(piece.to_string()),
                    }
                }
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if segments.first().is_some_and(|s| s.contains(':')) {
        return None;
    }
    if segments
        .first()
        .is_some_and(|s| s.eq_ignore_ascii_case(VSIX_CONTENTS))
    {
        segments.remove(0);
    }
    (!segments.is_empty()).then_some(segments)
}

/// Maps an entry path through the first matching rule.
#[must_use]
pub fn map_entry(rules: &[ExtractRule], path: &Path) -> Option<PathBuf> {
    let segments = entry_segments(path)?;
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    rules.iter().find_map(|rule| rule.apply(&segments))
}

/// Rules for compiler and linker binaries.
///
/// When cross-compiling, the native `Host<H>/<H>` folder is kept as well:
/// the cross compiler loads DLLs from it.
#[must_use]
pub fn toolset_rules(host: Arch, target: Arch) -> Vec<ExtractRule> {
    let host_dir = host.host_dir();
    let mut targets = vec![target];
    if host != target {
        targets.push(host);
    }
    targets
        .into_iter()
        .map(|arch| {
            ExtractRule::new(
                &format!("VC/Tools/MSVC/*/bin/{host_dir}/{arch}"),
                Path::new("bin").join(&host_dir).join(arch.as_str()),
            )
        })
        .collect()
}

/// Rules for MSVC headers (CRT, STL, ASAN).
#[must_use]
pub fn msvc_include_rules() -> Vec<ExtractRule> {
    vec![ExtractRule::new("VC/Tools/MSVC/*/include", "include")]
}

/// Rules for MSVC libraries of `target`, without store and UWP variants.
#[must_use]
pub fn msvc_lib_rules(target: Arch) -> Vec<ExtractRule> {
    vec![
        ExtractRule::new(
            &format!("VC/Tools/MSVC/*/lib/{target}"),
            Path::new("lib").join(target.as_str()),
        )
        .excluding(&["store", "uwp", "onecore"]),
    ]
}

/// Rules for MSVC runtime sources.
#[must_use]
pub fn msvc_source_rules() -> Vec<ExtractRule> {
    vec![ExtractRule::new(
        "VC/Tools/MSVC/*/crt/src",
        Path::new("crt").join("src"),
    )]
}

/// Rules for the debug CRT DLLs, which a cabinet unpacks flat. They land
/// next to the compiler for `target`.
#[must_use]
pub fn debug_runtime_rules(host: Arch, target: Arch) -> Vec<ExtractRule> {
    vec![ExtractRule::new(
        "",
        Path::new("bin").join(host.host_dir()).join(target.as_str()),
    )]
}

/// Rules for SDK headers; each kit (`um`, `ucrt`, `shared`) keeps its folder.
#[must_use]
pub fn sdk_include_rules() -> Vec<ExtractRule> {
    vec![ExtractRule::new("Windows Kits/10/Include/*/{}", "include")]
}

/// Rules for SDK import libraries of `target` (`lib/um/x64`, `lib/ucrt/x64`).
#[must_use]
pub fn sdk_lib_rules(target: Arch) -> Vec<ExtractRule> {
    vec![
        ExtractRule::new(&format!("Windows Kits/10/Lib/*/{{}}/{{{target}}}"), "lib")
            .excluding(&["ucrt_enclave"]),
    ]
}

/// Rules for SDK tools running on `host` (`rc.exe`, `mt.exe`).
#[must_use]
pub fn sdk_tool_rules(host: Arch) -> Vec<ExtractRule> {
    vec![
        ExtractRule::new(
            &format!("Windows Kits/10/bin/*/{host}"),
            Path::new("bin").join(host.as_str()),
        )
        .excluding(&["chpe"]),
    ]
}
