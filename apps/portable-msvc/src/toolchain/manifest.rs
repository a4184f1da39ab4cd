//! Visual Studio manifest fetching and parsing.
//!
//! The feed is split over two documents:
//!
//! 1. The *channel manifest* at a fixed URL
//!    (default: `https://aka.ms/vs/17/release/channel`). It lists channel
//!    items, one of which points at the Visual Studio manifest and another of
//!    which carries the Build Tools license link.
//! 2. The *Visual Studio manifest*, a large JSON document with every
//!    installable package:
//!
//! ```json
//! {
//!   "packages": [
//!     {
//!       "id": "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64.base",
//!       "version": "14.32.31342",
//!       "type": "Vsix",
//!       "payloads": [
//!         { "fileName": "payload.vsix", "url": "https://...", "sha256": "...", "size": 1234 }
//!       ],
//!       "dependencies": { "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64.Res.base": "14.32.31342" }
//!     }
//!   ]
//! }
//! ```
//!
//! Both documents are deserialized into raw serde structs and then validated
//! into [`Manifest`], [`ManifestEntry`] and [`PackageRef`]. Anything the rest
//! of the tool relies on is checked here, so malformed input fails with
//! [`MsvcError::Parse`] before any package is downloaded.
//!
//! The channel URL can be overridden with the `PORTABLE_MSVC_CHANNEL_URL`
//! environment variable. `file://` URLs are read from disk, which allows
//! offline mirrors.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::download::local_path;
use super::version::VersionId;
use crate::errors::MsvcError;

/// Environment variable to override the channel manifest URL.
pub const CHANNEL_URL_ENV: &str = "PORTABLE_MSVC_CHANNEL_URL";

/// Default channel manifest URL.
const DEFAULT_CHANNEL_URL: &str = "https://aka.ms/vs/17/release/channel";

/// Channel item pointing at the Visual Studio manifest.
const VS_MANIFEST_ITEM: &str = "Microsoft.VisualStudio.Manifests.VisualStudio";

/// Channel item carrying the Build Tools license.
const BUILD_TOOLS_ITEM: &str = "Microsoft.VisualStudio.Product.BuildTools";

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// User-Agent header for HTTP requests.
pub const USER_AGENT: &str = concat!("portable-msvc/", env!("CARGO_PKG_VERSION"));

const MSVC_COMPONENT_PREFIX: &str = "microsoft.visualstudio.component.vc.";
const MSVC_COMPONENT_SUFFIX: &str = ".x86.x64";
const SDK_COMPONENT_PREFIXES: [&str; 2] = [
    "microsoft.visualstudio.component.windows10sdk.",
    "microsoft.visualstudio.component.windows11sdk.",
];
const SDK_PACKAGE_PREFIXES: [&str; 2] = ["win10sdk_", "win11sdk_"];

/// Debug CRT DLLs, shared by every toolset.
const DEBUG_RUNTIME_PACKAGE: &str = "microsoft.visualcpp.runtimedebug.14";

/// A release channel of the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// MSVC compiler toolsets.
    Msvc,
    /// Windows SDK releases.
    Sdk,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Msvc => f.write_str("MSVC"),
            Self::Sdk => f.write_str("Windows SDK"),
        }
    }
}

/// Archive format of a payload, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Visual Studio extension package (a zip file).
    Vsix,
    /// Plain zip archive.
    Zip,
    /// Windows Installer package.
    Msi,
    /// Cabinet file referenced by an MSI.
    Cab,
    /// Anything else (executables, catalogs).
    Other,
}

impl PayloadKind {
    /// Classifies a payload by file extension, ignoring case.
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Self {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("vsix") => Self::Vsix,
            Some("zip") => Self::Zip,
            Some("msi") => Self::Msi,
            Some("cab") => Self::Cab,
            _ => Self::Other,
        }
    }

    /// Returns `true` for formats the zip reader can open in place.
    #[must_use]
    pub fn is_zip(self) -> bool {
        matches!(self, Self::Vsix | Self::Zip)
    }
}

/// One downloadable file of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// File name, without any `Installers\` directory prefix.
    pub file_name: String,
    /// Download URL, taken verbatim from the manifest.
    pub url: String,
    /// Lowercase hex SHA-256 of the file, when the manifest declares one.
    pub sha256: Option<String>,
    /// Declared size in bytes.
    pub size: Option<u64>,
}

impl Payload {
    /// Returns the archive format of this payload.
    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        PayloadKind::from_file_name(&self.file_name)
    }

    /// Returns the file name without its extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map_or(self.file_name.as_str(), |(stem, _)| stem)
    }
}

/// A validated package from the Visual Studio manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    /// Package id. MSVC ids are lowercased; SDK ids are payload stems.
    pub id: String,
    /// Declared package version.
    pub version: String,
    /// Package language, `None` for neutral packages.
    pub language: Option<String>,
    /// Files making up the package.
    pub payloads: Vec<Payload>,
    /// Lowercased ids of the packages this one depends on.
    pub dependencies: Vec<String>,
}

impl PackageRef {
    /// Returns the sum of declared payload sizes, if every payload declares one.
    #[must_use]
    pub fn declared_size(&self) -> Option<u64> {
        self.payloads.iter().map(|p| p.size).sum()
    }
}

/// One advertised release of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// The release identifier.
    pub version: VersionId,
    /// Shorter spellings accepted on the command line (`14.32`, `22621`).
    pub aliases: Vec<String>,
    /// Packages belonging to this release.
    pub packages: Vec<PackageRef>,
    /// Cabinet files shared by the release's MSI packages.
    pub cabinets: Vec<Payload>,
}

/// The parsed feed: release entries per channel plus the license link.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    channels: BTreeMap<Channel, Vec<ManifestEntry>>,
    license_url: Option<String>,
    debug_runtime: Option<PackageRef>,
}

impl Manifest {
    /// Returns the entries of a channel in manifest order.
    #[must_use]
    pub fn entries(&self, channel: Channel) -> &[ManifestEntry] {
        self.channels.get(&channel).map_or(&[], Vec::as_slice)
    }

    /// Finds the entry with the given version identifier.
    #[must_use]
    pub fn entry(&self, channel: Channel, version: &VersionId) -> Option<&ManifestEntry> {
        self.entries(channel)
            .iter()
            .find(|e| e.version.as_str() == version.as_str())
    }

    /// Returns the version identifiers of a channel in ascending order.
    #[must_use]
    pub fn versions(&self, channel: Channel) -> Vec<&VersionId> {
        let mut versions: Vec<&VersionId> =
            self.entries(channel).iter().map(|e| &e.version).collect();
        versions.sort();
        versions
    }

    /// Returns the license URL advertised by the channel manifest.
    #[must_use]
    pub fn license_url(&self) -> Option<&str> {
        self.license_url.as_deref()
    }

    /// Returns the debug CRT runtime package, if the feed lists one.
    #[must_use]
    pub fn debug_runtime(&self) -> Option<&PackageRef> {
        self.debug_runtime.as_ref()
    }

    /// Adds entries to a channel, skipping versions that are already present.
    pub fn insert_entries(&mut self, channel: Channel, entries: Vec<ManifestEntry>) {
        let existing = self.channels.entry(channel).or_default();
        for entry in entries {
            if let Some(known) = existing
                .iter_mut()
                .find(|e| e.version.as_str() == entry.version.as_str())
            {
                for alias in entry.aliases {
                    if !known.aliases.contains(&alias) {
                        known.aliases.push(alias);
                    }
                }
                continue;
            }
            existing.push(entry);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChannelManifest {
    channel_items: Vec<RawChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChannelItem {
    id: String,
    #[serde(default)]
    payloads: Vec<RawChannelPayload>,
    #[serde(default)]
    localized_resources: Vec<RawLocalizedResource>,
}

#[derive(Debug, Deserialize)]
struct RawChannelPayload {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawLocalizedResource {
    language: String,
    #[serde(default)]
    license: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVsManifest {
    packages: Vec<RawPackage>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPackage {
    id: String,
    version: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    payloads: Vec<RawPayload>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

impl RawPackage {
    /// Lowercased ids of the dependencies.
    ///
    /// A dependency value is either a version string or an object whose
    /// optional `id` overrides the key.
    fn dependency_ids(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|(key, dep)| {
                dep.get("id")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or(key)
                    .to_ascii_lowercase()
            })
            .collect()
    }

    fn is_default_language(&self) -> bool {
        self.language
            .as_deref()
            .is_none_or(|lang| lang.eq_ignore_ascii_case("en-US"))
    }
}

/// The parsed channel manifest.
#[derive(Debug)]
pub struct ChannelManifest {
    vs_manifest_url: String,
    license_url: Option<String>,
}

impl ChannelManifest {
    /// Returns the Visual Studio manifest URL.
    #[must_use]
    pub fn vs_manifest_url(&self) -> &str {
        &self.vs_manifest_url
    }

    /// Returns the English Build Tools license URL, if advertised.
    #[must_use]
    pub fn license_url(&self) -> Option<&str> {
        self.license_url.as_deref()
    }
}

/// Parses the channel manifest.
///
/// # Errors
///
/// Returns [`MsvcError::Parse`] if the document is not valid JSON, lacks the
/// Visual Studio manifest item, or that item has no usable payload URL.
pub fn parse_channel_manifest(text: &str) -> Result<ChannelManifest> {
    let raw: RawChannelManifest = serde_json::from_str(text)
        .map_err(|e| MsvcError::parse(format!("invalid channel manifest: {e}")))?;

    let vs_item = raw
        .channel_items
        .iter()
        .find(|item| item.id == VS_MANIFEST_ITEM)
        .ok_or_else(|| {
            MsvcError::parse(format!("channel manifest has no {VS_MANIFEST_ITEM} item"))
        })?;

    let vs_manifest_url = vs_item
        .payloads
        .first()
        .map(|p| p.url.trim().to_string())
        .filter(|url| is_supported_url(url))
        .ok_or_else(|| {
            MsvcError::parse(format!("{VS_MANIFEST_ITEM} item has no usable payload URL"))
        })?;

    let license_url = raw
        .channel_items
        .iter()
        .find(|item| item.id == BUILD_TOOLS_ITEM)
        .and_then(|item| {
            item.localized_resources
                .iter()
                .find(|r| r.language.eq_ignore_ascii_case("en-us"))
        })
        .and_then(|r| r.license.clone());

    Ok(ChannelManifest {
        vs_manifest_url,
        license_url,
    })
}

/// Parses the Visual Studio manifest into MSVC and SDK release entries.
///
/// # Errors
///
/// Returns [`MsvcError::Parse`] if the document is not valid JSON or a
/// package belonging to an advertised release has a malformed payload.
pub fn parse_vs_manifest(text: &str, license_url: Option<&str>) -> Result<Manifest> {
    let raw: RawVsManifest = serde_json::from_str(text)
        .map_err(|e| MsvcError::parse(format!("invalid Visual Studio manifest: {e}")))?;

    let index = index_packages(raw.packages)?;

    let debug_runtime = index
        .get(DEBUG_RUNTIME_PACKAGE)
        .map(|raw| package_ref(raw, DEBUG_RUNTIME_PACKAGE.to_string()))
        .transpose()?;

    let mut manifest = Manifest {
        channels: BTreeMap::new(),
        license_url: license_url.map(ToString::to_string),
        debug_runtime,
    };
    manifest.insert_entries(Channel::Msvc, msvc_entries(&index)?);
    manifest.insert_entries(Channel::Sdk, sdk_entries(&index)?);

    debug!(
        msvc = manifest.entries(Channel::Msvc).len(),
        sdk = manifest.entries(Channel::Sdk).len(),
        "parsed Visual Studio manifest"
    );
    Ok(manifest)
}

/// Indexes packages by lowercase id, keeping the first language-neutral or
/// English variant of each.
fn index_packages(packages: Vec<RawPackage>) -> Result<BTreeMap<String, RawPackage>> {
    let mut index = BTreeMap::new();
    for package in packages {
        if package.id.trim().is_empty() {
            return Err(MsvcError::parse("package with empty id").into());
        }
        if !package.is_default_language() {
            continue;
        }
        index
            .entry(package.id.to_ascii_lowercase())
            .or_insert(package);
    }
    Ok(index)
}

fn msvc_entries(index: &BTreeMap<String, RawPackage>) -> Result<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    for key in index.keys() {
        let Some(middle) = key
            .strip_prefix(MSVC_COMPONENT_PREFIX)
            .and_then(|rest| rest.strip_suffix(MSVC_COMPONENT_SUFFIX))
        else {
            continue;
        };
        if !middle.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let Some(version) = VersionId::parse(middle) else {
            debug!(component = %key, "skipping MSVC component with non-numeric version");
            continue;
        };

        let family = format!("microsoft.vc.{middle}.");
        let packages = index
            .iter()
            .filter(|(id, _)| id.starts_with(&family))
            .map(|(_, raw)| package_ref(raw, raw.id.to_ascii_lowercase()))
            .collect::<Result<Vec<_>>>()?;

        let short = version.prefix(2);
        let aliases = if short == version.as_str() {
            Vec::new()
        } else {
            vec![short]
        };
        entries.push(ManifestEntry {
            version,
            aliases,
            packages,
            cabinets: Vec::new(),
        });
    }
    Ok(entries)
}

fn sdk_entries(index: &BTreeMap<String, RawPackage>) -> Result<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    for (key, component) in index {
        let Some(number) = SDK_COMPONENT_PREFIXES
            .iter()
            .find_map(|prefix| key.strip_prefix(prefix))
        else {
            continue;
        };
        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let Some(sdk_id) = component.dependency_ids().into_iter().find(|dep| {
            SDK_PACKAGE_PREFIXES
                .iter()
                .any(|prefix| dep.starts_with(prefix))
        }) else {
            debug!(component = %key, "SDK component has no SDK package dependency");
            continue;
        };
        let Some(sdk_package) = index.get(&sdk_id) else {
            debug!(component = %key, package = %sdk_id, "SDK package missing from manifest");
            continue;
        };

        let version = sdk_id
            .split_once('_')
            .and_then(|(_, suffix)| VersionId::parse(suffix))
            .or_else(|| VersionId::parse(number));
        let Some(version) = version else {
            continue;
        };

        let mut packages = Vec::new();
        let mut cabinets = Vec::new();
        for raw in &sdk_package.payloads {
            let payload = payload(raw, &sdk_package.id)?;
            if payload.kind() == PayloadKind::Cab {
                cabinets.push(payload);
            } else {
                packages.push(PackageRef {
                    id: payload.stem().to_string(),
                    version: sdk_package.version.clone(),
                    language: sdk_package.language.clone(),
                    payloads: vec![payload],
                    dependencies: Vec::new(),
                });
            }
        }

        let aliases = if number == version.as_str() {
            Vec::new()
        } else {
            vec![number.to_string()]
        };
        entries.push(ManifestEntry {
            version,
            aliases,
            packages,
            cabinets,
        });
    }
    Ok(entries)
}

fn package_ref(raw: &RawPackage, id: String) -> Result<PackageRef> {
    let payloads = raw
        .payloads
        .iter()
        .map(|p| payload(p, &raw.id))
        .collect::<Result<Vec<_>>>()?;
    Ok(PackageRef {
        id,
        version: raw.version.clone(),
        language: raw.language.clone(),
        payloads,
        dependencies: raw.dependency_ids(),
    })
}

/// Validates a raw payload of `package`.
fn payload(raw: &RawPayload, package: &str) -> Result<Payload> {
    let file_name = raw
        .file_name
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or_default()
        .trim();
    if file_name.is_empty() {
        return Err(MsvcError::parse(format!(
            "package {package} has a payload without a file name"
        ))
        .into());
    }

    let url = raw.url.trim();
    if !is_supported_url(url) {
        return Err(MsvcError::parse(format!(
            "package {package} payload {file_name} has unsupported URL {url:?}"
        ))
        .into());
    }

    let sha256 = match raw.sha256.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(digest) if digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()) => {
            Some(digest.to_ascii_lowercase())
        }
        Some(digest) => {
            return Err(MsvcError::parse(format!(
                "package {package} payload {file_name} has malformed sha256 {digest:?}"
            ))
            .into());
        }
    };

    Ok(Payload {
        file_name: file_name.to_string(),
        url: url.to_string(),
        sha256,
        size: raw.size,
    })
}

fn is_supported_url(url: &str) -> bool {
    ["https://", "http://", "file://"].iter().any(|scheme| {
        url.len() > scheme.len()
            && url
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Returns the channel manifest URL.
///
/// Checks the `PORTABLE_MSVC_CHANNEL_URL` environment variable first, then
/// falls back to the public Visual Studio 2022 channel. Empty or
/// whitespace-only values are treated as unset.
#[must_use]
pub fn channel_url() -> String {
    std::env::var(CHANNEL_URL_ENV)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_CHANNEL_URL.to_string())
}

/// Handles HTTP errors with user-friendly messages.
fn handle_http_error(status: reqwest::StatusCode, url: &str) -> MsvcError {
    match status.as_u16() {
        404 => MsvcError::network(url, "manifest not found (HTTP 404)"),
        code if code >= 500 => MsvcError::network(url, format!("server error (HTTP {code})")),
        code => MsvcError::network(url, format!("HTTP error {code}")),
    }
}

/// Builds the HTTP client used for manifest requests.
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")
}

/// Fetches a manifest document as text.
async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    if let Some(path) = local_path(url) {
        return tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| MsvcError::network(url, format!("cannot read local manifest: {e}")).into());
    }

    debug!(%url, "requesting manifest");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MsvcError::network(url, format!("request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(handle_http_error(response.status(), url).into());
    }

    Ok(response
        .text()
        .await
        .map_err(|e| MsvcError::network(url, format!("failed to read response: {e}")))?)
}

/// Fetches and parses the manifest from the configured channel URL.
///
/// Issues two requests: the channel manifest, then the Visual Studio manifest
/// it points to.
///
/// # Errors
///
/// Returns [`MsvcError::Network`] if either document cannot be retrieved and
/// [`MsvcError::Parse`] if either is malformed.
pub async fn fetch_manifest() -> Result<Manifest> {
    fetch_manifest_from(&channel_url()).await
}

/// Fetches and parses the manifest starting from `channel_url`.
///
/// # Errors
///
/// See [`fetch_manifest`].
pub async fn fetch_manifest_from(channel_url: &str) -> Result<Manifest> {
    let client = http_client()?;

    let channel_text = fetch_text(&client, channel_url).await?;
    let channel = parse_channel_manifest(&channel_text)?;

    let vs_text = fetch_text(&client, channel.vs_manifest_url()).await?;
    parse_vs_manifest(&vs_text, channel.license_url())
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Small but structurally faithful manifest documents shared by tests.

    /// A Visual Studio manifest with one MSVC toolset and one SDK.
    pub const VS_MANIFEST: &str = r#"{
        "packages": [
            {
                "id": "Microsoft.VisualStudio.Component.VC.14.32.17.2.x86.x64",
                "version": "17.2.32505.173",
                "type": "Component",
                "dependencies": { "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64": "14.32.31342" }
            },
            {
                "id": "Microsoft.VisualStudio.Component.VC.Tools.x86.x64",
                "version": "17.2.32505.173",
                "type": "Component"
            },
            {
                "id": "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64.base",
                "version": "14.32.31342",
                "type": "Vsix",
                "payloads": [
                    { "fileName": "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64.base.vsix", "url": "https://example.invalid/tools.vsix", "size": 100 }
                ],
                "dependencies": {
                    "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64.Res.base": "14.32.31342",
                    "Microsoft.VisualCpp.Tools.Common.UtilsPrereq": "17.2.32505"
                }
            },
            {
                "id": "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64.Res.base",
                "version": "14.32.31342",
                "type": "Vsix",
                "language": "en-US",
                "payloads": [
                    { "fileName": "res.vsix", "url": "https://example.invalid/res.vsix" }
                ]
            },
            {
                "id": "Microsoft.VC.14.32.17.2.Tools.HostX64.TargetX64.Res.base",
                "version": "14.32.31342",
                "type": "Vsix",
                "language": "de-DE",
                "payloads": [
                    { "fileName": "res.de.vsix", "url": "https://example.invalid/res.de.vsix" }
                ]
            },
            {
                "id": "Microsoft.VC.14.32.17.2.CRT.Headers.base",
                "version": "14.32.31342",
                "type": "Vsix",
                "payloads": [
                    { "fileName": "headers.vsix", "url": "https://example.invalid/headers.vsix" }
                ]
            },
            {
                "id": "Microsoft.VC.14.32.17.2.CRT.x64.Desktop.base",
                "version": "14.32.31342",
                "type": "Vsix",
                "payloads": [
                    { "fileName": "crt.vsix", "url": "https://example.invalid/crt.vsix" }
                ]
            },
            {
                "id": "Microsoft.VC.14.32.17.2.CRT.x64.Store.base",
                "version": "14.32.31342",
                "type": "Vsix",
                "payloads": [
                    { "fileName": "store.vsix", "url": "https://example.invalid/store.vsix" }
                ]
            },
            {
                "id": "Microsoft.VisualCpp.RuntimeDebug.14",
                "version": "14.32.31326",
                "type": "Msi",
                "payloads": [
                    { "fileName": "vc_RuntimeDebug.msi", "url": "https://example.invalid/dbg.msi" },
                    { "fileName": "cab1.cab", "url": "https://example.invalid/cab1.cab" }
                ]
            },
            {
                "id": "Microsoft.VisualStudio.Component.Windows11SDK.22621",
                "version": "17.2.32505.173",
                "type": "Component",
                "dependencies": {
                    "Microsoft.VisualStudio.Component.Windows10SDK": "17.2.32505.173",
                    "Win11SDK_10.0.22621": { "version": "10.0.22621.1", "id": "Win11SDK_10.0.22621" }
                }
            },
            {
                "id": "Microsoft.VisualStudio.Component.Windows10SDK.19041",
                "version": "17.2.32505.173",
                "type": "Component",
                "dependencies": { "Win10SDK_10.0.19041": "10.0.19041.8" }
            },
            {
                "id": "Win11SDK_10.0.22621",
                "version": "10.0.22621.1",
                "type": "Exe",
                "payloads": [
                    { "fileName": "Installers\\Windows SDK Desktop Headers x64-x86_en-us.msi", "url": "https://example.invalid/h.msi", "sha256": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA" },
                    { "fileName": "Installers\\Windows SDK Desktop Libs x64-x86_en-us.msi", "url": "https://example.invalid/l.msi" },
                    { "fileName": "Installers\\0123456789abcdef0123456789abcdef.cab", "url": "https://example.invalid/c.cab" }
                ]
            },
            {
                "id": "Win10SDK_10.0.19041",
                "version": "10.0.19041.8",
                "type": "Exe",
                "payloads": [
                    { "fileName": "Installers\\Windows SDK Desktop Headers x64-x86_en-us.msi", "url": "https://example.invalid/old.msi" }
                ]
            }
        ]
    }"#;

    /// Builds a channel manifest pointing at `vs_manifest_url`.
    pub fn channel_manifest(vs_manifest_url: &str) -> String {
        format!(
            r#"{{
                "channelItems": [
                    {{
                        "id": "Microsoft.VisualStudio.Product.BuildTools",
                        "localizedResources": [
                            {{ "language": "de-de", "license": "https://example.invalid/lizenz" }},
                            {{ "language": "en-us", "license": "https://example.invalid/license" }}
                        ]
                    }},
                    {{
                        "id": "Microsoft.VisualStudio.Manifests.VisualStudio",
                        "payloads": [ {{ "url": "{vs_manifest_url}" }} ]
                    }}
                ]
            }}"#
        )
    }
}
