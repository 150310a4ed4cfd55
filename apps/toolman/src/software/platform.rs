//! Platform detection for tool downloads.
//!
//! Catalog files are keyed by operating system and CPU architecture. Vendors
//! spell these differently (`darwin`/`macos`, `amd64`/`x64`), so plugins map
//! the neutral [`Os`] and [`Arch`] values onto their own vocabulary.

use std::fmt;

use crate::errors::{Result, ToolmanError};

/// Supported operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux
    Linux,
    /// macOS
    Macos,
    /// Windows
    Windows,
}

/// Supported CPU architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// `x86_64`
    X64,
    /// ARM64 / `aarch64`
    Arm64,
}

/// An operating system and architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Creates a platform from its parts.
    #[must_use]
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detects the platform this binary was compiled for.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::UnsupportedPlatform` if the OS or architecture
    /// is not one of the supported values.
    pub fn detect() -> Result<Self> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Builds a platform from `std::env::consts`-style names.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self> {
        let unsupported = || {
            ToolmanError::unsupported_platform(
                "toolman",
                env!("CARGO_PKG_VERSION"),
                format!("{os}-{arch}"),
            )
        };

        let os = match os {
            "linux" => Os::Linux,
            "macos" => Os::Macos,
            "windows" => Os::Windows,
            _ => return Err(unsupported()),
        };
        let arch = match arch {
            "x86_64" => Arch::X64,
            "aarch64" => Arch::Arm64,
            _ => return Err(unsupported()),
        };
        Ok(Self::new(os, arch))
    }
}

impl Os {
    /// Returns the neutral OS name: `linux`, `macos` or `windows`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        }
    }
}

impl Arch {
    /// Returns the neutral architecture name: `x64` or `arm64`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_display_joins_os_and_arch() {
        assert_eq!(Platform::new(Os::Linux, Arch::X64).to_string(), "linux-x64");
        assert_eq!(Platform::new(Os::Macos, Arch::Arm64).to_string(), "macos-arm64");
        assert_eq!(Platform::new(Os::Windows, Arch::X64).to_string(), "windows-x64");
        assert_eq!(Platform::new(Os::Linux, Arch::Arm64).to_string(), "linux-arm64");
    }

    #[test]
    fn from_parts_maps_std_consts() {
        let platform = Platform::from_parts("macos", "aarch64").expect("Should map");
        assert_eq!(platform, Platform::new(Os::Macos, Arch::Arm64));
    }

    #[test]
    fn from_parts_rejects_unknown_values() {
        assert!(Platform::from_parts("freebsd", "x86_64").is_err());
        assert!(Platform::from_parts("linux", "riscv64").is_err());
    }

    #[test]
    fn detect_returns_platform_on_supported_system() {
        let result = Platform::detect();
        #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
        assert!(matches!(result, Ok(p) if p == Platform::new(Os::Linux, Arch::X64)));

        #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
        assert!(matches!(result, Ok(p) if p == Platform::new(Os::Macos, Arch::Arm64)));

        let _ = result;
    }
}
