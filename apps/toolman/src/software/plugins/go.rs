//! The Go toolchain, from the official download catalog.
//!
//! The catalog at `https://go.dev/dl/?mode=json&include=all` lists every
//! release with one entry per file:
//!
//! ```json
//! [{"version": "go1.21.3", "stable": true, "files": [
//!   {"filename": "go1.21.3.linux-amd64.tar.gz", "os": "linux", "arch": "amd64",
//!    "sha256": "1241...", "kind": "archive"}
//! ]}]
//! ```
//!
//! Only `archive` files are installable. Every Go archive holds a `go/`
//! folder, so extraction roots are named after the archive instead.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{Result, ToolmanError};
use crate::software::archive::NamingStrategy;
use crate::software::download::Downloader;
use crate::software::env::EnvVar;
use crate::software::package::{FetchedPackage, InstalledPackage, PackageType};
use crate::software::platform::{Arch, Os};
use crate::software::plugin::{Asset, AssetFile, Integrity, SoftwarePlugin, verify_integrity};
use crate::software::version::Version;

/// Environment variable overriding the catalog URL.
pub const GO_DIST_ENV: &str = "TOOLMAN_GO_DIST";

/// Official catalog of every Go release.
pub const DEFAULT_CATALOG_URL: &str = "https://go.dev/dl/?mode=json&include=all";

/// Base URL archives are downloaded from.
const DOWNLOAD_BASE_URL: &str = "https://go.dev/dl/";

#[derive(Debug, Deserialize)]
struct GoRelease {
    version: String,
    #[serde(default)]
    files: Vec<GoFile>,
}

#[derive(Debug, Deserialize)]
struct GoFile {
    filename: String,
    os: String,
    arch: String,
    #[serde(default)]
    sha256: String,
    kind: String,
}

/// Installs Go from the official catalog.
#[derive(Debug, Clone)]
pub struct GoPlugin {
    catalog_url: String,
}

impl GoPlugin {
    /// Creates a plugin reading the catalog at `catalog_url`.
    #[must_use]
    pub fn new(catalog_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
        }
    }

    /// Creates a plugin reading the catalog named by `TOOLMAN_GO_DIST`, or the
    /// official one.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(GO_DIST_ENV) {
            Ok(url) if !url.trim().is_empty() => Self::new(url),
            _ => Self::new(DEFAULT_CATALOG_URL),
        }
    }

    /// Returns the URL archives listed in the catalog are fetched from.
    ///
    /// The official catalog lists bare file names served from `go.dev/dl/`.
    /// Mirrors given through `TOOLMAN_GO_DIST` serve archives next to their
    /// catalog file.
    fn archive_url(&self, filename: &str) -> String {
        if self.catalog_url == DEFAULT_CATALOG_URL {
            return format!("{DOWNLOAD_BASE_URL}{filename}");
        }
        let base = self
            .catalog_url
            .split('?')
            .next()
            .unwrap_or(&self.catalog_url);
        match base.rfind('/') {
            Some(slash) => format!("{}{filename}", &base[..=slash]),
            None => filename.to_string(),
        }
    }

    fn asset(&self, release: GoRelease) -> Option<Asset> {
        let Some(version) = normalize_version(&release.version) else {
            debug!(version = %release.version, "skipping unrecognized Go version");
            return None;
        };

        let files = release
            .files
            .into_iter()
            .filter(|file| file.kind == "archive")
            .filter_map(|file| {
                let os = go_os(&file.os)?;
                let arch = go_arch(&file.arch)?;
                let integrity = if file.sha256.is_empty() {
                    Integrity::None
                } else {
                    Integrity::Sha256(file.sha256)
                };
                Some(AssetFile {
                    url: self.archive_url(&file.filename),
                    package_type: PackageType::from_file_name(&file.filename),
                    file_name: file.filename,
                    os,
                    arch,
                    integrity,
                })
            })
            .collect();

        Some(Asset { version, files })
    }
}

#[async_trait]
impl SoftwarePlugin for GoPlugin {
    fn name(&self) -> &str {
        "go"
    }

    fn naming_strategy(&self) -> NamingStrategy {
        NamingStrategy::ReplaceTopLevelDirWithArchiveName
    }

    async fn available_assets(&self, downloader: &dyn Downloader) -> Result<Vec<Asset>> {
        let body = downloader.fetch_text(&self.catalog_url).await?;
        let releases: Vec<GoRelease> = serde_json::from_str(&body).map_err(|e| {
            ToolmanError::download(format!("malformed Go catalog at {}: {e}", self.catalog_url))
        })?;

        let assets: Vec<Asset> = releases
            .into_iter()
            .filter_map(|release| self.asset(release))
            .collect();
        debug!(count = assets.len(), "loaded Go catalog");
        Ok(assets)
    }

    async fn verify(
        &self,
        _asset: &Asset,
        file: &AssetFile,
        package: &FetchedPackage,
        downloader: &dyn Downloader,
    ) -> Result<()> {
        verify_integrity(file, package, downloader, &[]).await
    }

    fn environment(&self, package: &InstalledPackage) -> Vec<EnvVar> {
        let root = go_root(package).display().to_string();
        vec![
            EnvVar::set("GOROOT", root.clone()),
            EnvVar::prepend_path("PATH", format!("{root}/bin")),
        ]
    }

    async fn post_install(&self, package: &InstalledPackage) -> Result<()> {
        let binary = if cfg!(windows) { "go.exe" } else { "go" };
        let root = go_root(package);
        if !root.join("bin").join(binary).is_file() {
            warn!(
                path = %root.display(),
                "installed Go tree has no bin/{binary}"
            );
        }
        Ok(())
    }
}

/// Returns the Go tree inside an install.
///
/// Archives that list no `go/` directory entry extract flat, leaving the
/// tree one level down.
fn go_root(package: &InstalledPackage) -> PathBuf {
    let nested = package.path.join("go");
    if nested.join("bin").is_dir() {
        nested
    } else {
        package.path.clone()
    }
}

/// Turns a catalog version into a parseable one.
///
/// Strips the `go` prefix and pads pre-releases to three components:
/// `go1.21.3` becomes `1.21.3`, `go1.21rc2` becomes `1.21.0-rc2`, `go1.9`
/// becomes `1.9.0`.
fn normalize_version(raw: &str) -> Option<String> {
    let raw = raw.strip_prefix("go").unwrap_or(raw);
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (numbers, qualifier) = raw.split_at(split);

    let mut parts: Vec<&str> = numbers.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    parts.resize(3, "0");

    let normalized = if qualifier.is_empty() {
        parts.join(".")
    } else {
        format!("{}-{qualifier}", parts.join("."))
    };

    Version::parse(&normalized).ok().map(|_| normalized)
}

fn go_os(os: &str) -> Option<Os> {
    match os {
        "linux" => Some(Os::Linux),
        "darwin" => Some(Os::Macos),
        "windows" => Some(Os::Windows),
        _ => None,
    }
}

fn go_arch(arch: &str) -> Option<Arch> {
    match arch {
        "amd64" => Some(Arch::X64),
        "arm64" => Some(Arch::Arm64),
        _ => None,
    }
}
