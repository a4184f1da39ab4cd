//! Download and extraction of resolved packages.
//!
//! The install runs in two phases:
//!
//! 1. **Download.** Every payload is fetched into the [`ArtifactCache`], up to
//!    `jobs` at a time. Payloads already in the cache are not fetched again.
//!    MSI payloads are then scanned for the cabinets they reference, and those
//!    are fetched next to them.
//! 2. **Extract.** Packages are unpacked one at a time, in resolved order,
//!    into the [`MergedTree`]. The order is fixed so the result of any
//!    overwrite is the same on every run.
//!
//! Nothing is extracted unless every download succeeded. The first failed
//! download stops the queue: payloads not yet started are never fetched.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use super::archive::{ExtractStats, extract_zip};
use super::cache::ArtifactCache;
use super::download::{ProgressCallback, ProgressEvent, download_file};
use super::manifest::{Payload, PayloadKind};
use super::merge::{Collision, MergedTree};
use super::msi::{cab_names, extract_cab, extract_msi};
use super::resolver::{PackageCategory, ResolvedPackage};
use crate::errors::MsvcError;

/// Progress callback that also receives the package id.
pub type PackageProgress = Arc<dyn Fn(&str, ProgressEvent) + Send + Sync>;

/// Settings of one install run.
#[derive(Clone)]
pub struct InstallOptions {
    /// Directory holding downloaded payloads.
    pub cache_root: PathBuf,
    /// Maximum number of concurrent downloads.
    pub jobs: usize,
    /// Retries per download after the first failure.
    pub retries: u32,
    /// Fail on conflicting writes instead of letting the later one win.
    pub strict_merge: bool,
    /// Download progress sink.
    pub progress: Option<PackageProgress>,
}

/// Outcome of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageReport {
    /// Package id.
    pub id: String,
    /// Package category.
    pub category: PackageCategory,
    /// All payloads were served from the cache.
    pub cached: bool,
    /// Files written to the tree.
    pub files: usize,
    /// Bytes written to the tree.
    pub bytes: u64,
}

/// Outcome of an install run.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// One entry per resolved package, in install order.
    pub packages: Vec<PackageReport>,
    /// Files written per category.
    pub files_per_category: BTreeMap<PackageCategory, usize>,
    /// Payloads fetched over the network (or copied from `file://`).
    pub downloads: usize,
    /// Payloads served from the cache.
    pub cache_hits: usize,
    /// Bytes transferred by fresh downloads.
    pub downloaded_bytes: u64,
    /// Files overwritten with different content.
    pub collisions: Vec<Collision>,
}

impl InstallReport {
    /// Returns the total number of files written.
    #[must_use]
    pub fn total_files(&self) -> usize {
        self.packages.iter().map(|p| p.files).sum()
    }
}

/// One payload to place in the cache.
#[derive(Debug, Clone)]
struct DownloadJob {
    /// Index of the owning package.
    owner: usize,
    payload: Payload,
    dest: PathBuf,
}

#[derive(Debug, Clone, Copy)]
struct Fetched {
    owner: usize,
    cached: bool,
    bytes: u64,
}

/// Installs `resolved` into `destination`.
///
/// # Errors
///
/// Returns the first download failure, then any extraction, filesystem or
/// strict merge failure. Once a download fails no further download starts;
/// those already running are allowed to finish so no partial files are left
/// behind. The cache directory may exist after a failure, but nothing is
/// written to `destination` outside it.
pub async fn install(
    resolved: &[ResolvedPackage],
    destination: &Path,
    options: &InstallOptions,
) -> Result<InstallReport> {
    let cache = ArtifactCache::new(&options.cache_root);
    cache.ensure_root()?;
    debug!(cache = %cache.root().display(), packages = resolved.len(), "starting install");

    let mut report = InstallReport::default();
    let mut cached_flags = vec![true; resolved.len()];

    let jobs = payload_jobs(resolved, &cache);
    record(&mut report, &mut cached_flags, fetch_all(jobs, resolved, options).await?);

    let cab_jobs = cabinet_jobs(resolved, &cache)?;
    record(&mut report, &mut cached_flags, fetch_all(cab_jobs, resolved, options).await?);

    info!(
        downloads = report.downloads,
        cache_hits = report.cache_hits,
        bytes = report.downloaded_bytes,
        "downloads complete"
    );

    std::fs::create_dir_all(destination)
        .map_err(|e| MsvcError::filesystem(destination, "cannot create output directory", e))?;
    let mut tree = MergedTree::new(destination, options.strict_merge);

    for (package, cached) in resolved.iter().zip(cached_flags) {
        let mut stats = ExtractStats::default();
        for payload in &package.package.payloads {
            let archive = cache.path_for(payload);
            let extracted = match payload.kind() {
                kind if kind.is_zip() => {
                    extract_zip(&archive, &package.rules, package.id(), &mut tree)?
                }
                PayloadKind::Msi => {
                    extract_msi(&archive, &package.rules, package.id(), &mut tree).await?
                }
                PayloadKind::Cab => {
                    extract_cab(&archive, &package.rules, package.id(), &mut tree).await?
                }
                _ => continue,
            };
            stats.add(extracted);
        }
        debug!(
            package = %package.id(),
            category = %package.category,
            files = stats.files,
            "extracted"
        );
        if stats.files == 0 {
            warn!(package = %package.id(), "package contributed no files");
        }
        *report
            .files_per_category
            .entry(package.category)
            .or_default() += stats.files;
        report.packages.push(PackageReport {
            id: package.id().to_string(),
            category: package.category,
            cached,
            files: stats.files,
            bytes: stats.bytes,
        });
    }

    info!(
        root = %tree.root().display(),
        files = tree.file_count(),
        collisions = tree.collisions().len(),
        "extraction complete"
    );
    report.collisions = tree.collisions().to_vec();
    Ok(report)
}

fn record(report: &mut InstallReport, cached_flags: &mut [bool], fetched: Vec<Fetched>) {
    for item in fetched {
        if item.cached {
            report.cache_hits += 1;
        } else {
            report.downloads += 1;
            report.downloaded_bytes += item.bytes;
            cached_flags[item.owner] = false;
        }
    }
}

/// Returns a job for every extractable payload of every package.
fn payload_jobs(resolved: &[ResolvedPackage], cache: &ArtifactCache) -> Vec<DownloadJob> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    for (owner, package) in resolved.iter().enumerate() {
        for payload in &package.package.payloads {
            let kind = payload.kind();
            if !(kind.is_zip() || matches!(kind, PayloadKind::Msi | PayloadKind::Cab)) {
                debug!(package = %package.id(), file = %payload.file_name, "skipping payload");
                continue;
            }
            let dest = cache.path_for(payload);
            if seen.insert(dest.clone()) {
                jobs.push(DownloadJob {
                    owner,
                    payload: payload.clone(),
                    dest,
                });
            }
        }
    }
    jobs
}

/// Returns a job for every cabinet referenced by a downloaded MSI.
fn cabinet_jobs(resolved: &[ResolvedPackage], cache: &ArtifactCache) -> Result<Vec<DownloadJob>> {
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();
    for (owner, package) in resolved.iter().enumerate() {
        for msi in package
            .package
            .payloads
            .iter()
            .filter(|p| p.kind() == PayloadKind::Msi)
        {
            let msi_path = cache.path_for(msi);
            let bytes = std::fs::read(&msi_path)
                .map_err(|e| MsvcError::filesystem(&msi_path, "cannot read installer", e))?;
            for name in cab_names(&bytes) {
                let Some(cabinet) = package
                    .cabinets
                    .iter()
                    .find(|c| c.file_name.eq_ignore_ascii_case(&name))
                else {
                    warn!(package = %package.id(), cabinet = %name, "cabinet not listed in manifest");
                    continue;
                };
                let dest = cache.companion_path(msi, &cabinet.file_name);
                if seen.insert(dest.clone()) {
                    jobs.push(DownloadJob {
                        owner,
                        payload: cabinet.clone(),
                        dest,
                    });
                }
            }
        }
    }
    Ok(jobs)
}

/// Runs `jobs` through a pool of `options.jobs` workers.
///
/// After the first failure, jobs that have not started yet are skipped.
async fn fetch_all(
    jobs: Vec<DownloadJob>,
    resolved: &[ResolvedPackage],
    options: &InstallOptions,
) -> Result<Vec<Fetched>> {
    let failed = AtomicBool::new(false);
    let results: Vec<Result<Option<Fetched>>> =
        futures_util::stream::iter(jobs.into_iter().map(|job| {
            let label = resolved[job.owner].id().to_string();
            let progress = options.progress.clone();
            let retries = options.retries;
            let failed = &failed;
            async move {
                if failed.load(Ordering::SeqCst) {
                    debug!(file = %job.payload.file_name, "skipped after earlier failure");
                    return Ok(None);
                }
                let result = fetch_one(job, label, retries, progress).await;
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                result.map(Some)
            }
        }))
        .buffer_unordered(options.jobs.max(1))
        .collect()
        .await;

    let mut fetched = Vec::with_capacity(results.len());
    for result in results {
        if let Some(item) = result? {
            fetched.push(item);
        }
    }
    Ok(fetched)
}

async fn fetch_one(
    job: DownloadJob,
    label: String,
    retries: u32,
    progress: Option<PackageProgress>,
) -> Result<Fetched> {
    if ArtifactCache::is_cached(&job.dest) {
        debug!(file = %job.payload.file_name, "cache hit");
        return Ok(Fetched {
            owner: job.owner,
            cached: true,
            bytes: 0,
        });
    }

    let callback: ProgressCallback = match progress {
        Some(progress) => Arc::new(move |event| progress(&label, event)),
        None => Arc::new(|_: ProgressEvent| {}),
    };
    let bytes = download_file(
        &job.payload.url,
        &job.dest,
        job.payload.sha256.as_deref(),
        retries,
        callback,
    )
    .await?;

    Ok(Fetched {
        owner: job.owner,
        cached: false,
        bytes,
    })
}
