//! Actions of the portable-msvc CLI.
//!
//! - [`install`] - Fetch, resolve, download and extract a toolchain (default)
//! - [`show_versions`] - List versions offered by the manifest

pub mod install;
pub mod show_versions;
