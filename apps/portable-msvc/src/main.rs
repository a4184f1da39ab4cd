#![warn(clippy::pedantic)]

//! # portable-msvc
//!
//! Downloads the MSVC compiler toolchain and the Windows SDK from the Visual
//! Studio package feed and assembles them into a self-contained directory,
//! without installing Visual Studio.
//!
//! ## Usage
//!
//! List the versions the feed offers:
//! ```bash
//! portable-msvc --show-versions
//! ```
//!
//! Install the latest toolset and SDK into `./msvc`:
//! ```bash
//! portable-msvc --accept-license
//! ```
//!
//! Cross toolchain for arm64 with parallel downloads:
//! ```bash
//! portable-msvc --accept-license --target arm64 --jobs 4
//! ```
//!
//! ## Output
//!
//! ```text
//! msvc/
//!   bin/Hostx64/x64/      cl.exe, link.exe, ...
//!   bin/x64/              rc.exe, mt.exe, ...
//!   include/              CRT, STL and SDK headers (um, shared, ucrt, ...)
//!   lib/x64/              CRT libraries
//!   lib/um/x64/           SDK import libraries
//!   downloads/            payload cache, reused by later runs
//!   setup.bat, setup.ps1  environment setup
//! ```

mod commands;
mod errors;
mod logging;
mod toolchain;

use anyhow::Result;
use clap::Parser;
use commands::{install, show_versions};
use errors::MsvcError;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("PORTABLE_MSVC_GIT_COMMIT"),
    ")"
);

/// Portable MSVC toolchain and Windows SDK downloader.
#[derive(Parser)]
#[command(
    name = "portable-msvc",
    author,
    version = VERSION,
    about = "Downloads a portable MSVC toolchain and Windows SDK",
    long_about = "Downloads the MSVC compiler toolchain and the Windows SDK from the Visual Studio \
    package feed and assembles them into a self-contained directory with setup scripts. \
    Downloads require accepting the Visual Studio license with --accept-license.",
    after_help = "\
EXIT CODES:
    0  success
    2  network or manifest failure, invalid arguments
    3  requested version not found
    4  license not accepted
    5  filesystem, extraction or merge failure
    6  download or checksum failure
    7  a required package category is empty

ENVIRONMENT VARIABLES:
    PORTABLE_MSVC_CHANNEL_URL  Channel manifest URL (default: https://aka.ms/vs/17/release/channel)
    RUST_LOG                   Log filter, overrides --verbose"
)]
pub struct Cli {
    /// Print the available MSVC and Windows SDK versions and exit.
    #[clap(long)]
    pub show_versions: bool,

    /// Enable debug logging on stderr.
    #[clap(long, short = 'v')]
    pub verbose: bool,

    #[command(flatten)]
    pub install: install::InstallArgs,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints an error and returns the exit code for it.
///
/// Typed [`MsvcError`]s map to their own code; anything else exits with 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    e.downcast_ref::<MsvcError>().map_or(1, MsvcError::exit_code)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if cli.show_versions {
        show_versions::execute().await
    } else {
        install::execute(&cli.install).await
    }
}
