//! Host and target architecture handling.
//!
//! MSVC ships separate compilers per host architecture (the machine running
//! `cl.exe`) and per target architecture (the machine the produced binaries run
//! on). Package ids and directory names spell them differently, so the naming
//! conventions are centralised here.

use std::fmt;

/// A Windows processor architecture as named by the Visual Studio feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum Arch {
    /// 64-bit x86.
    X64,
    /// 32-bit x86.
    X86,
    /// 32-bit ARM. Only valid as a target.
    Arm,
    /// 64-bit ARM.
    Arm64,
}

impl Arch {
    /// All architectures, in the order the feed lists them.
    pub const ALL: [Self; 4] = [Self::X64, Self::X86, Self::Arm, Self::Arm64];

    /// Detects the architecture of the running machine.
    ///
    /// Falls back to `x64` when running on something the toolchain has no
    /// host binaries for.
    #[must_use]
    pub fn detect_host() -> Self {
        match std::env::consts::ARCH {
            "x86" => Self::X86,
            "aarch64" => Self::Arm64,
            _ => Self::X64,
        }
    }

    /// Returns the lowercase identifier used in package ids and directories.
    #[must_use = "returns the architecture string without side effects"]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::X86 => "x86",
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
        }
    }

    /// Returns `true` if MSVC publishes compilers that run on this architecture.
    #[must_use]
    pub fn can_host(self) -> bool {
        !matches!(self, Self::Arm)
    }

    /// Returns the compiler directory name for this host, e.g. `Hostx64`.
    #[must_use]
    pub fn host_dir(self) -> String {
        format!("Host{}", self.as_str())
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
