//! Package records passed between the stages of the install pipeline.
//!
//! ```text
//! fetch ──► FetchedPackage ──► extract ──► ExtractedPackage ──► history ──► InstalledPackage
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::software::version::Version;

/// Packaging of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// Gzip-compressed tarball (`.tar.gz`, `.tgz`).
    #[serde(rename = "tar.gz")]
    TarGz,
    /// Zip archive.
    Zip,
    /// macOS disk image.
    Dmg,
    /// A bare file with no packaging.
    Raw,
    /// Anything else.
    Unknown,
}

impl PackageType {
    /// Guesses the packaging from a file name or URL.
    #[must_use]
    pub fn from_file_name(name: &str) -> Self {
        let name = name.rsplit('/').next().unwrap_or(name).to_ascii_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else if name.ends_with(".zip") {
            Self::Zip
        } else if name.ends_with(".dmg") {
            Self::Dmg
        } else if Path::new(&name).extension().is_none() {
            Self::Raw
        } else {
            Self::Unknown
        }
    }

    /// Returns the conventional name of this packaging.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
            Self::Dmg => "dmg",
            Self::Raw => "raw",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An artifact downloaded to local disk.
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    /// The version the artifact belongs to.
    pub version: Version,
    /// Where the artifact was written.
    pub file_path: PathBuf,
    /// How the artifact is packaged.
    pub package_type: PackageType,
}

/// An artifact unpacked onto disk.
#[derive(Debug, Clone)]
pub struct ExtractedPackage {
    /// The version the artifact belongs to.
    pub version: Version,
    /// The extraction root.
    pub path: PathBuf,
}

/// One entry of a tool's install history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPackage {
    /// Installed version.
    pub version: Version,
    /// Extraction root of the install.
    pub path: PathBuf,
    /// Install time in milliseconds since the Unix epoch.
    pub installed_on: i64,
    /// Whether the user selected this version as the active one.
    pub main: bool,
}

impl InstalledPackage {
    /// Records an extracted package as installed now, not flagged main.
    #[must_use]
    pub fn from_extracted(package: ExtractedPackage) -> Self {
        Self {
            version: package.version,
            path: package.path,
            installed_on: now_millis(),
            main: false,
        }
    }
}

/// Returns the current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_type_from_file_name() {
        assert_eq!(
            PackageType::from_file_name("go1.21.3.linux-amd64.tar.gz"),
            PackageType::TarGz
        );
        assert_eq!(PackageType::from_file_name("tool.TGZ"), PackageType::TarGz);
        assert_eq!(
            PackageType::from_file_name("https://x/y/tool-win.zip"),
            PackageType::Zip
        );
        assert_eq!(PackageType::from_file_name("tool.dmg"), PackageType::Dmg);
        assert_eq!(PackageType::from_file_name("tool"), PackageType::Raw);
        assert_eq!(PackageType::from_file_name("tool.msi"), PackageType::Unknown);
    }

    #[test]
    fn package_type_serializes_conventional_names() {
        let json = serde_json::to_string(&PackageType::TarGz).expect("Should serialize");
        assert_eq!(json, "\"tar.gz\"");
        let zip: PackageType = serde_json::from_str("\"zip\"").expect("Should deserialize");
        assert_eq!(zip, PackageType::Zip);
    }

    #[test]
    fn installed_package_uses_camel_case_keys() {
        let package = InstalledPackage {
            version: Version::parse("1.2.3").expect("Should parse"),
            path: PathBuf::from("/opt/tool/1.2.3"),
            installed_on: 1_700_000_000_000,
            main: true,
        };

        let value = serde_json::to_value(&package).expect("Should serialize");
        assert_eq!(value["version"], "1.2.3");
        assert_eq!(value["path"], "/opt/tool/1.2.3");
        assert_eq!(value["installedOn"], 1_700_000_000_000_i64);
        assert_eq!(value["main"], true);
    }

    #[test]
    fn from_extracted_is_not_main() {
        let package = InstalledPackage::from_extracted(ExtractedPackage {
            version: Version::parse("1.0").expect("Should parse"),
            path: PathBuf::from("/tmp/x"),
        });
        assert!(!package.main);
        assert!(package.installed_on > 0);
    }
}
