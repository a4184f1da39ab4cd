//! MSVC and Windows SDK acquisition.
//!
//! ## Module Structure
//!
//! - [`arch`] - Host and target architectures
//! - [`version`] - Version identifiers and selection
//! - [`manifest`] - Channel and Visual Studio manifest fetching and parsing
//! - [`resolver`] - Expansion of versions into installable packages
//! - [`layout`] - Mapping of package paths onto the merged tree
//! - [`cache`] - On-disk payload cache
//! - [`download`] - HTTP download with progress tracking
//! - [`verify`] - SHA256 checksum verification
//! - [`archive`] - `.vsix`/`.zip` extraction
//! - [`msi`] - Windows Installer payloads and their cabinets
//! - [`merge`] - The merged output tree and collision detection
//! - [`pipeline`] - Download and extraction of a resolved package set
//! - [`script`] - `setup.bat` / `setup.ps1` generation

pub mod archive;
pub mod arch;
pub mod cache;
pub mod download;
pub mod layout;
pub mod manifest;
pub mod merge;
pub mod msi;
pub mod pipeline;
pub mod resolver;
pub mod script;
pub mod verify;
pub mod version;

pub use arch::Arch;
pub use download::{ProgressEvent, format_bytes, format_speed};
pub use manifest::{Channel, Manifest, fetch_manifest};
pub use pipeline::{InstallOptions, InstallReport, PackageProgress, install};
pub use resolver::{ResolvedPackage, resolve};
pub use script::{ScriptContext, emit_setup_script};
pub use version::select_version;
