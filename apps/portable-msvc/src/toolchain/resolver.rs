//! Expansion of the selected versions into the packages to install.
//!
//! The MSVC half is driven by package ids
//! (`microsoft.vc.<version>.tools.hostx64.targetx64.base`, ...) and their
//! dependencies within the same toolset family. The SDK half is driven by the
//! installer file names of the SDK package. The debug CRT cabinet, shared by
//! all toolsets, is added when the feed lists it. Everything is classified into a
//! [`PackageCategory`]; store, UWP and WinRT-only content is dropped.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use anyhow::Result;
use tracing::debug;

use super::arch::Arch;
use super::layout::{
    ExtractRule, debug_runtime_rules, msvc_include_rules, msvc_lib_rules, msvc_source_rules, sdk_include_rules,
    sdk_lib_rules, sdk_tool_rules, toolset_rules,
};
use super::manifest::{Channel, Manifest, ManifestEntry, PackageRef, Payload, PayloadKind};
use super::version::VersionId;
use crate::errors::MsvcError;

/// Payload of the debug runtime package holding the DLLs.
const DEBUG_RUNTIME_CABINET: &str = "cab1.cab";

/// What a package contributes to the toolchain.
///
/// The declaration order is the install order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackageCategory {
    /// Compiler and linker binaries.
    Toolset,
    /// Localized compiler resources.
    ToolsetResources,
    /// C/C++ runtime and STL headers.
    CrtHeaders,
    /// C/C++ runtime libraries for the target.
    CrtLibs,
    /// C/C++ runtime sources.
    CrtSource,
    /// Address sanitizer headers and libraries.
    Asan,
    /// Debug CRT DLLs (`/MDd` runtime), placed next to the compiler.
    DebugRuntime,
    /// Windows SDK headers.
    SdkHeaders,
    /// Windows SDK import libraries.
    SdkLibs,
    /// Windows SDK tools (`rc.exe`, `mt.exe`).
    SdkTools,
    /// Universal CRT headers and libraries.
    UniversalCrt,
    /// Store, UWP or WinRT-only content. Never installed.
    StoreOnly,
}

impl PackageCategory {
    /// Categories without which the toolchain cannot compile and link.
    pub const REQUIRED: [Self; 5] = [
        Self::Toolset,
        Self::CrtHeaders,
        Self::CrtLibs,
        Self::SdkHeaders,
        Self::SdkLibs,
    ];

    /// Returns the category name used in reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toolset => "toolset",
            Self::ToolsetResources => "toolset-resources",
            Self::CrtHeaders => "crt-headers",
            Self::CrtLibs => "crt-libs",
            Self::CrtSource => "crt-source",
            Self::Asan => "asan",
            Self::DebugRuntime => "debug-runtime",
            Self::SdkHeaders => "sdk-headers",
            Self::SdkLibs => "sdk-libs",
            Self::SdkTools => "sdk-tools",
            Self::UniversalCrt => "ucrt",
            Self::StoreOnly => "store-only",
        }
    }

    /// Returns the extraction rules for packages of this category.
    #[must_use]
    pub fn rules(self, host: Arch, target: Arch) -> Vec<ExtractRule> {
        match self {
            Self::Toolset | Self::ToolsetResources => toolset_rules(host, target),
            Self::CrtHeaders => msvc_include_rules(),
            Self::CrtLibs => msvc_lib_rules(target),
            Self::CrtSource => msvc_source_rules(),
            Self::Asan => {
                let mut rules = msvc_include_rules();
                rules.extend(msvc_lib_rules(target));
                rules.extend(toolset_rules(host, target));
                rules
            }
            Self::DebugRuntime => debug_runtime_rules(host, target),
            Self::SdkHeaders => sdk_include_rules(),
            Self::SdkLibs => sdk_lib_rules(target),
            Self::SdkTools => sdk_tool_rules(host),
            Self::UniversalCrt => {
                let mut rules = sdk_include_rules();
                rules.extend(sdk_lib_rules(target));
                rules
            }
            Self::StoreOnly => Vec::new(),
        }
    }
}

impl fmt::Display for PackageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A package selected for installation in this run.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    /// The manifest package.
    pub package: PackageRef,
    /// What the package contributes.
    pub category: PackageCategory,
    /// Where its files land in the merged tree.
    pub rules: Vec<ExtractRule>,
    /// Cabinet files an MSI payload may reference.
    pub cabinets: Vec<Payload>,
}

impl ResolvedPackage {
    /// Returns the package id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.package.id
    }
}

/// Resolves the packages for one MSVC and one SDK version.
///
/// The result is ordered by category (toolset first, SDK last) and by id
/// within a category.
///
/// # Errors
///
/// Returns [`MsvcError::NotFound`] if either version is missing from the
/// manifest and [`MsvcError::NoPackagesFound`] if a required category ends
/// up empty.
pub fn resolve(
    manifest: &Manifest,
    msvc_version: &VersionId,
    sdk_version: &VersionId,
    host: Arch,
    target: Arch,
) -> Result<Vec<ResolvedPackage>> {
    let msvc = manifest
        .entry(Channel::Msvc, msvc_version)
        .ok_or_else(|| {
            MsvcError::not_found(Channel::Msvc.to_string(), msvc_version.as_str(), &[])
        })?;
    let sdk = manifest
        .entry(Channel::Sdk, sdk_version)
        .ok_or_else(|| {
            MsvcError::not_found(Channel::Sdk.to_string(), sdk_version.as_str(), &[])
        })?;

    let mut resolved = resolve_msvc(msvc, host, target);
    resolved.extend(resolve_debug_runtime(manifest, host, target));
    resolved.extend(resolve_sdk(sdk, host, target));
    resolved.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.id().cmp(b.id())));

    for category in PackageCategory::REQUIRED {
        if !resolved.iter().any(|p| p.category == category) {
            return Err(MsvcError::no_packages_found(
                category.as_str(),
                msvc_version.as_str(),
                sdk_version.as_str(),
            )
            .into());
        }
    }

    Ok(resolved)
}

/// Classifies an MSVC package by its id with the family prefix removed.
fn classify_msvc(rest: &str, host: Arch, target: Arch) -> Option<PackageCategory> {
    if [".store.", ".uwp.", ".winrt.", "onecore", "cppwinrt"]
        .iter()
        .any(|marker| rest.contains(marker))
    {
        return Some(PackageCategory::StoreOnly);
    }

    let toolset = format!("tools.host{host}.target{target}");
    let native = format!("tools.host{host}.target{host}");
    let category = match rest {
        r if r == format!("{toolset}.base") || r == format!("{native}.base") => {
            PackageCategory::Toolset
        }
        r if r == format!("{toolset}.res.base") || r == format!("{native}.res.base") => {
            PackageCategory::ToolsetResources
        }
        "crt.headers.base" => PackageCategory::CrtHeaders,
        r if r == format!("crt.{target}.desktop.base") => PackageCategory::CrtLibs,
        "crt.source.base" => PackageCategory::CrtSource,
        r if r == "asan.headers.base" || r == format!("asan.{target}.base") => {
            PackageCategory::Asan
        }
        _ => return None,
    };
    Some(category)
}

fn resolve_msvc(entry: &ManifestEntry, host: Arch, target: Arch) -> Vec<ResolvedPackage> {
    let family = format!("microsoft.vc.{}.", entry.version);
    let mut walk = FamilyWalk {
        entry,
        family: &family,
        host,
        target,
        seen: BTreeSet::new(),
        resolved: Vec::new(),
    };

    walk.run([
        format!("tools.host{host}.target{target}.base"),
        format!("tools.host{host}.target{target}.res.base"),
        "crt.headers.base".to_string(),
        format!("crt.{target}.desktop.base"),
        "crt.source.base".to_string(),
        "asan.headers.base".to_string(),
        format!("asan.{target}.base"),
    ]);

    // A cross compiler loads DLLs from the native toolset, but only pull it
    // in when the cross compiler itself exists.
    let has_toolset = walk
        .resolved
        .iter()
        .any(|p| p.category == PackageCategory::Toolset);
    if host != target && has_toolset {
        walk.run([format!("tools.host{host}.target{host}.base")]);
    }

    walk.resolved
}

/// Breadth-first expansion of MSVC package ids within one toolset family.
struct FamilyWalk<'a> {
    entry: &'a ManifestEntry,
    family: &'a str,
    host: Arch,
    target: Arch,
    seen: BTreeSet<String>,
    resolved: Vec<ResolvedPackage>,
}

impl FamilyWalk<'_> {
    fn run(&mut self, roots: impl IntoIterator<Item = String>) {
        let mut queue: VecDeque<String> = roots
            .into_iter()
            .map(|rest| format!("{}{rest}", self.family))
            .collect();

        while let Some(id) = queue.pop_front() {
            if !self.seen.insert(id.clone()) {
                continue;
            }
            let Some(package) = self.entry.packages.iter().find(|p| p.id == id) else {
                debug!(package = %id, "not in manifest");
                continue;
            };
            let Some(rest) = id.strip_prefix(self.family) else {
                continue;
            };
            match classify_msvc(rest, self.host, self.target) {
                Some(PackageCategory::StoreOnly) => {
                    debug!(package = %id, "excluding store-only package");
                    continue;
                }
                Some(category) => {
                    debug!(
                        package = %id,
                        version = %package.version,
                        language = package.language.as_deref().unwrap_or("neutral"),
                        %category,
                        "selected"
                    );
                    self.resolved.push(ResolvedPackage {
                        package: package.clone(),
                        category,
                        rules: category.rules(self.host, self.target),
                        cabinets: Vec::new(),
                    });
                }
                None => {
                    debug!(package = %id, "not part of the desktop toolchain");
                    continue;
                }
            }
            queue.extend(
                package
                    .dependencies
                    .iter()
                    .filter(|dep| dep.starts_with(self.family))
                    .cloned(),
            );
        }
    }
}

/// Selects the cabinet of the debug CRT package. The package is optional.
fn resolve_debug_runtime(manifest: &Manifest, host: Arch, target: Arch) -> Option<ResolvedPackage> {
    let Some(package) = manifest.debug_runtime() else {
        debug!("manifest has no debug runtime package");
        return None;
    };
    let Some(cabinet) = package
        .payloads
        .iter()
        .find(|p| p.file_name.eq_ignore_ascii_case(DEBUG_RUNTIME_CABINET))
    else {
        debug!(package = %package.id, "debug runtime package has no {DEBUG_RUNTIME_CABINET}");
        return None;
    };

    let category = PackageCategory::DebugRuntime;
    debug!(package = %package.id, version = %package.version, %category, "selected");
    Some(ResolvedPackage {
        package: PackageRef {
            payloads: vec![cabinet.clone()],
            ..package.clone()
        },
        category,
        rules: category.rules(host, target),
        cabinets: Vec::new(),
    })
}

/// Classifies an SDK installer by its file name stem.
fn classify_sdk(stem: &str, host: Arch, target: Arch) -> Option<PackageCategory> {
    let stem = stem.to_ascii_lowercase();
    let category = match stem.as_str() {
        s if s == format!("windows sdk desktop headers {target}-x86_en-us") => {
            PackageCategory::SdkHeaders
        }
        s if s == format!("windows sdk desktop libs {target}-x86_en-us") => {
            PackageCategory::SdkLibs
        }
        s if s == format!("windows sdk desktop tools {host}-x86_en-us") => {
            PackageCategory::SdkTools
        }
        // The store apps installers carry the shared `um`/`shared` headers,
        // the common import libraries, and rc.exe.
        "windows sdk for windows store apps headers-x86_en-us" => PackageCategory::SdkHeaders,
        "windows sdk for windows store apps libs-x86_en-us" => PackageCategory::SdkLibs,
        "windows sdk for windows store apps tools-x86_en-us" => PackageCategory::SdkTools,
        "universal crt headers libraries and sources-x86_en-us" => PackageCategory::UniversalCrt,
        s if ["store apps", "contracts", "metadata", "intellisense", "certification", "uwp"]
            .iter()
            .any(|marker| s.contains(marker)) =>
        {
            PackageCategory::StoreOnly
        }
        _ => return None,
    };
    Some(category)
}

fn resolve_sdk(entry: &ManifestEntry, host: Arch, target: Arch) -> Vec<ResolvedPackage> {
    let mut resolved = Vec::new();
    for package in &entry.packages {
        match classify_sdk(&package.id, host, target) {
            Some(PackageCategory::StoreOnly) => {
                debug!(package = %package.id, "excluding store-only SDK installer");
            }
            Some(category) => {
                debug!(package = %package.id, version = %package.version, %category, "selected");
                let is_msi = package
                    .payloads
                    .iter()
                    .any(|p| p.kind() == PayloadKind::Msi);
                resolved.push(ResolvedPackage {
                    package: package.clone(),
                    category,
                    rules: category.rules(host, target),
                    cabinets: if is_msi {
                        entry.cabinets.clone()
                    } else {
                        Vec::new()
                    },
                });
            }
            None => {}
        }
    }
    resolved
}
