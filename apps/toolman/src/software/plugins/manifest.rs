//! Tools described by a JSON release manifest.
//!
//! Any vendor that publishes a manifest in this shape can be installed
//! without code changes:
//!
//! ```json
//! [
//!   {
//!     "version": "20.11.0",
//!     "files": [
//!       {
//!         "url": "https://example.com/node-v20.11.0-linux-x64.tar.gz",
//!         "os": "linux",
//!         "arch": "x64",
//!         "sha256": "9556...",
//!         "signature": "https://example.com/node-v20.11.0-linux-x64.tar.gz.sig"
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! Tools are defined under `tools` in the configuration file:
//!
//! ```json
//! {
//!   "tools": {
//!     "node": {
//!       "manifest": "https://example.com/node.json",
//!       "naming": "top-level-dir",
//!       "keys": ["/etc/toolman/keys/node.pub"],
//!       "env": [
//!         { "name": "NODE_HOME", "value": "{path}" },
//!         { "name": "PATH", "value": "{path}/bin", "prepend": true }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! A file with a `signature` is checked against `keys`; otherwise a
//! `sha256` is compared.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{Result, ToolmanError};
use crate::software::archive::NamingStrategy;
use crate::software::config::ConfigFile;
use crate::software::download::{Downloader, file_name_from_url};
use crate::software::env::EnvVar;
use crate::software::package::{FetchedPackage, InstalledPackage, PackageType};
use crate::software::platform::{Arch, Os};
use crate::software::plugin::{Asset, AssetFile, Integrity, SoftwarePlugin, verify_integrity};

/// Configuration key holding tool definitions.
pub const TOOLS_KEY: &str = "tools";

/// Placeholder replaced by the extraction root in env templates.
const PATH_PLACEHOLDER: &str = "{path}";

/// A tool definition from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolDefinition {
    /// URL of the release manifest.
    pub manifest: String,
    #[serde(default)]
    pub naming: NamingStrategy,
    /// Trusted key files for signed artifacts.
    #[serde(default)]
    pub keys: Vec<PathBuf>,
    #[serde(default)]
    pub env: Vec<EnvTemplate>,
}

/// An environment variable with a `{path}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvTemplate {
    pub name: String,
    pub value: String,
    /// Prepend to the existing value as a search path instead of replacing it.
    #[serde(default)]
    pub prepend: bool,
}

impl EnvTemplate {
    fn render(&self, path: &str) -> EnvVar {
        let value = self.value.replace(PATH_PLACEHOLDER, path);
        if self.prepend {
            EnvVar::prepend_path(&self.name, value)
        } else {
            EnvVar::set(&self.name, value)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestRelease {
    version: String,
    #[serde(default)]
    files: Vec<ManifestFile>,
}

#[derive(Debug, Deserialize)]
struct ManifestFile {
    url: String,
    os: String,
    arch: String,
    sha256: Option<String>,
    signature: Option<String>,
}

/// Installs a tool from a JSON release manifest.
#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    name: String,
    definition: ToolDefinition,
}

impl ManifestPlugin {
    #[must_use]
    pub fn new(name: impl Into<String>, definition: ToolDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    /// Builds one plugin per tool defined in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Config` if the definitions are malformed.
    pub fn from_config(config: &ConfigFile) -> Result<Vec<Self>> {
        let tools: BTreeMap<String, ToolDefinition> =
            config.get(TOOLS_KEY)?.unwrap_or_default();
        Ok(tools
            .into_iter()
            .map(|(name, definition)| Self::new(name, definition))
            .collect())
    }

    fn asset(release: ManifestRelease) -> Asset {
        let files = release
            .files
            .into_iter()
            .filter_map(|file| {
                let (Some(os), Some(arch)) = (manifest_os(&file.os), manifest_arch(&file.arch))
                else {
                    debug!(url = %file.url, os = %file.os, arch = %file.arch, "skipping unknown platform");
                    return None;
                };
                let file_name = file_name_from_url(&file.url)?.to_string();
                let integrity = match (file.signature, file.sha256) {
                    (Some(url), _) => Integrity::Signature { url },
                    (None, Some(digest)) => Integrity::Sha256(digest),
                    (None, None) => Integrity::None,
                };
                Some(AssetFile {
                    package_type: PackageType::from_file_name(&file_name),
                    url: file.url,
                    file_name,
                    os,
                    arch,
                    integrity,
                })
            })
            .collect();

        Asset {
            version: release.version,
            files,
        }
    }
}

#[async_trait]
impl SoftwarePlugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn naming_strategy(&self) -> NamingStrategy {
        self.definition.naming
    }

    async fn available_assets(&self, downloader: &dyn Downloader) -> Result<Vec<Asset>> {
        let body = downloader.fetch_text(&self.definition.manifest).await?;
        let releases: Vec<ManifestRelease> = serde_json::from_str(&body).map_err(|e| {
            ToolmanError::download(format!(
                "malformed manifest for {} at {}: {e}",
                self.name, self.definition.manifest
            ))
        })?;

        Ok(releases.into_iter().map(Self::asset).collect())
    }

    async fn verify(
        &self,
        _asset: &Asset,
        file: &AssetFile,
        package: &FetchedPackage,
        downloader: &dyn Downloader,
    ) -> Result<()> {
        verify_integrity(file, package, downloader, &self.definition.keys).await
    }

    fn environment(&self, package: &InstalledPackage) -> Vec<EnvVar> {
        let path = package.path.display().to_string();
        self.definition
            .env
            .iter()
            .map(|template| template.render(&path))
            .collect()
    }
}

fn manifest_os(os: &str) -> Option<Os> {
    match os.to_ascii_lowercase().as_str() {
        "linux" => Some(Os::Linux),
        "macos" | "darwin" | "osx" => Some(Os::Macos),
        "windows" | "win" => Some(Os::Windows),
        _ => None,
    }
}

fn manifest_arch(arch: &str) -> Option<Arch> {
    match arch.to_ascii_lowercase().as_str() {
        "x64" | "amd64" | "x86_64" => Some(Arch::X64),
        "arm64" | "aarch64" => Some(Arch::Arm64),
        _ => None,
    }
}
