//! Host platform identity.
//!
//! Selects which Qodana CLI package is downloaded and which expected
//! checksum it is verified against.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Platform identifier combining OS and architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Get the current platform.
    ///
    /// Fails on hosts the tool is not published for.
    pub fn current() -> Result<Self> {
        let os = Os::parse(std::env::consts::OS);
        let arch = Arch::parse(std::env::consts::ARCH);
        match (os, arch) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => Err(Error::UnsupportedPlatform {
                platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            }),
        }
    }

    /// Parse from string like "linux_x86_64" or "darwin-arm64".
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (os, arch) = s.split_once(['_', '-'])?;
        Some(Self {
            os: Os::parse(os)?,
            arch: Arch::parse(arch)?,
        })
    }

    /// Archive format of the published package.
    #[must_use]
    pub fn archive_format(&self) -> ArchiveFormat {
        match self.os {
            Os::Windows => ArchiveFormat::Zip,
            Os::Linux | Os::Darwin => ArchiveFormat::TarGz,
        }
    }

    /// File name of the published package, e.g. `qodana_linux_x86_64.tar.gz`.
    #[must_use]
    pub fn package_name(&self, tool: &str) -> String {
        format!("{tool}_{self}.{}", self.archive_format().extension())
    }

    /// Name of the executable inside the package.
    #[must_use]
    pub fn executable_name(&self, tool: &str) -> String {
        match self.os {
            Os::Windows => format!("{tool}.exe"),
            Os::Linux | Os::Darwin => tool.to_string(),
        }
    }

    /// Every platform the tool is published for.
    #[must_use]
    pub fn all() -> [Self; 6] {
        [
            Self::new(Os::Linux, Arch::X86_64),
            Self::new(Os::Linux, Arch::Arm64),
            Self::new(Os::Darwin, Arch::X86_64),
            Self::new(Os::Darwin, Arch::Arm64),
            Self::new(Os::Windows, Arch::X86_64),
            Self::new(Os::Windows, Arch::Arm64),
        ]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux
    Linux,
    /// macOS
    Darwin,
    /// Windows
    Windows,
}

impl Os {
    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "darwin" | "macos" => Some(Self::Darwin),
            "windows" | "win32" => Some(Self::Windows),
            _ => None,
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::Darwin => write!(f, "darwin"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// x86_64 / amd64
    X86_64,
    /// arm64 / aarch64
    Arm64,
}

impl Arch {
    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            "arm64" | "aarch64" => Some(Self::Arm64),
            _ => None,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X86_64 => write!(f, "x86_64"),
            Self::Arm64 => write!(f, "arm64"),
        }
    }
}

/// Archive container of a downloaded package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.zip`, used on Windows.
    Zip,
    /// `.tar.gz`
    TarGz,
}

impl ArchiveFormat {
    /// File extension without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }
}
