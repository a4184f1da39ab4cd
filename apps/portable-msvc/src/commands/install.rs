//! The install action, run when `--show-versions` is not given.
//!
//! ## Usage
//!
//! ```bash
//! portable-msvc --accept-license                          # latest MSVC and SDK
//! portable-msvc --accept-license --msvc-version 14.32    # specific toolset
//! portable-msvc --accept-license --target arm64 --jobs 4
//! portable-msvc --accept-license --dry-run                # print the package plan
//! ```

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Args;
use tracing::debug;

use crate::errors::MsvcError;
use crate::toolchain::{
    Arch, Channel, InstallOptions, InstallReport, PackageProgress, ProgressEvent, ResolvedPackage,
    ScriptContext, emit_setup_script, fetch_manifest, format_bytes, format_speed, install,
    resolve, select_version,
};

/// Default output directory.
pub const DEFAULT_OUTPUT: &str = "msvc";

/// Cache directory name inside the output directory.
pub const DEFAULT_CACHE_DIR: &str = "downloads";

/// Arguments for the install action.
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// MSVC toolset version to install (e.g. "14.40" or "latest").
    #[clap(long, value_name = "ID")]
    pub msvc_version: Option<String>,

    /// Windows SDK version to install (e.g. "22621" or "latest").
    #[clap(long, value_name = "ID")]
    pub sdk_version: Option<String>,

    /// Accept the Visual Studio license terms. Required to download packages.
    #[clap(long)]
    pub accept_license: bool,

    /// Output directory for the merged toolchain.
    #[clap(long, value_name = "DIR", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Download cache directory [default: <OUTPUT>/downloads].
    #[clap(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Architecture the compiler runs on [default: this machine].
    #[clap(long, value_enum, value_name = "ARCH")]
    pub host: Option<Arch>,

    /// Architecture of the produced binaries.
    #[clap(long, value_enum, value_name = "ARCH", default_value_t = Arch::X64)]
    pub target: Arch,

    /// Maximum number of concurrent downloads.
    #[clap(long, value_name = "N", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Retry attempts for a failed download.
    #[clap(long, value_name = "N", default_value_t = 0)]
    pub retries: u32,

    /// Fail when two packages write different content to the same file.
    #[clap(long)]
    pub strict_merge: bool,

    /// Resolve and print the package plan without downloading anything.
    #[clap(long)]
    pub dry_run: bool,
}

/// Executes the install action.
///
/// # Process
///
/// 1. Check license acceptance (before any network request, even for
///    `--dry-run`)
/// 2. Fetch the channel and Visual Studio manifests
/// 3. Select the MSVC and SDK versions
/// 4. Resolve the package set for the host and target
/// 5. Download into the cache and extract into the output directory
/// 6. Write `setup.bat` and `setup.ps1`
///
/// # Errors
///
/// Returns an error if:
/// - `--accept-license` is missing ([`MsvcError::LicenseNotAccepted`])
/// - The host architecture cannot run MSVC ([`MsvcError::InvalidArguments`])
/// - The manifest cannot be fetched or parsed
/// - A requested version does not exist
/// - A required package category is empty
/// - Any download, extraction or write fails
pub async fn execute(args: &InstallArgs) -> Result<()> {
    if !args.accept_license {
        return Err(MsvcError::LicenseNotAccepted.into());
    }

    let host = args.host.unwrap_or_else(Arch::detect_host);
    if !host.can_host() {
        let hosts: Vec<&str> = Arch::ALL
            .iter()
            .filter(|arch| arch.can_host())
            .map(|arch| arch.as_str())
            .collect();
        return Err(MsvcError::invalid_arguments(format!(
            "MSVC has no compilers that run on {host}; choose --host {}",
            hosts.join(", ")
        ))
        .into());
    }
    let target = args.target;

    println!("Downloading manifest...");
    let manifest = fetch_manifest().await?;

    let msvc = select_version(&manifest, Channel::Msvc, args.msvc_version.as_deref())?;
    let sdk = select_version(&manifest, Channel::Sdk, args.sdk_version.as_deref())?;
    debug!(%msvc, %sdk, %host, %target, "selected versions");

    let resolved = resolve(&manifest, &msvc, &sdk, host, target)?;

    if args.dry_run {
        print_plan(&resolved, &msvc.to_string(), &sdk.to_string(), host, target);
        return Ok(());
    }

    if let Some(url) = manifest.license_url() {
        println!("Accepted Visual Studio license terms: {url}");
    }
    println!("Installing MSVC {msvc} and Windows SDK {sdk} (host {host}, target {target})");

    let cache_root = args
        .cache_dir
        .clone()
        .unwrap_or_else(|| args.output.join(DEFAULT_CACHE_DIR));
    let options = InstallOptions {
        cache_root,
        jobs: usize::from(args.jobs),
        retries: args.retries,
        strict_merge: args.strict_merge,
        progress: Some(progress_printer(args.jobs == 1)),
    };

    let report = install(&resolved, &args.output, &options).await?;

    let context = ScriptContext {
        msvc_version: msvc.as_str(),
        sdk_version: sdk.as_str(),
        host,
        target,
    };
    emit_setup_script(&args.output, &context)?;

    print_summary(&report);
    println!(
        "Toolchain installed to {}. Run setup.bat or setup.ps1 there to use it.",
        args.output.display()
    );

    Ok(())
}

fn print_plan(resolved: &[ResolvedPackage], msvc: &str, sdk: &str, host: Arch, target: Arch) {
    println!("MSVC {msvc}, Windows SDK {sdk} (host {host}, target {target})");
    println!("Packages:");
    for package in resolved {
        let size = package
            .package
            .declared_size()
            .map_or_else(String::new, |bytes| format!(" ({})", format_bytes(bytes)));
        println!("  {:<18} {}{size}", package.category.as_str(), package.id());
    }
}

fn print_summary(report: &InstallReport) {
    println!();
    println!("Packages:");
    for package in &report.packages {
        let source = if package.cached { "cached" } else { "downloaded" };
        println!(
            "  {:<18} {} ({} files, {source})",
            package.category.as_str(),
            package.id,
            package.files
        );
    }
    println!(
        "Extracted {} files from {} packages ({} downloads, {} from cache)",
        report.total_files(),
        report.packages.len(),
        report.downloads,
        report.cache_hits
    );
    if !report.collisions.is_empty() {
        println!(
            "{} files were overwritten by a later package with different content",
            report.collisions.len()
        );
    }
    println!("Total downloaded: {} MB", report.downloaded_bytes >> 20);
}

/// Builds the progress sink for downloads.
///
/// With a single download at a time the current line is redrawn; with
/// several, only start and completion lines are printed.
fn progress_printer(inline: bool) -> PackageProgress {
    let totals: Mutex<HashMap<String, u64>> = Mutex::new(HashMap::new());

    Arc::new(move |id: &str, event: ProgressEvent| match event {
        ProgressEvent::Started { total, .. } => {
            if let Ok(mut totals) = totals.lock() {
                totals.insert(id.to_string(), total);
            }
            if !inline {
                println!("Downloading {id}...");
            }
        }
        ProgressEvent::Progress { downloaded, speed } if inline => {
            let total = totals
                .lock()
                .ok()
                .and_then(|totals| totals.get(id).copied())
                .unwrap_or(0);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let percent = if total > 0 {
                (downloaded as f64 / total as f64 * 100.0) as u8
            } else {
                0
            };
            print!(
                "\r{id}: {}/{} ({percent}%) {}     ",
                format_bytes(downloaded),
                format_bytes(total),
                format_speed(speed)
            );
            let _ = std::io::stdout().flush();
        }
        ProgressEvent::Progress { .. } => {}
        ProgressEvent::Completed => {
            if inline {
                println!();
            } else {
                println!("Downloaded {id}");
            }
        }
        ProgressEvent::Failed { error } => {
            if inline {
                println!();
            }
            eprintln!("Download of {id} failed: {error}");
        }
    })
}
