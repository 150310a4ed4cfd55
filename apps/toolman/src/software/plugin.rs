//! Vendor plugins and their registry.
//!
//! A plugin knows one vendor's catalog: which versions exist, which file to
//! download for a platform, how to check it, and which environment variables
//! an installed version needs. The [`crate::software::installer::Installer`]
//! drives plugins through the [`SoftwarePlugin`] trait and never talks to a
//! vendor directly.
//!
//! Plugins are registered into a [`PluginRegistry`] at startup:
//!
//! - `go`, backed by the official Go download catalog
//! - every tool defined under `tools` in the configuration file

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::{Result, ToolmanError};
use crate::software::archive::NamingStrategy;
use crate::software::config::ConfigFile;
use crate::software::download::Downloader;
use crate::software::env::EnvVar;
use crate::software::package::{FetchedPackage, InstalledPackage, PackageType};
use crate::software::platform::{Arch, Os, Platform};
use crate::software::plugins::go::GoPlugin;
use crate::software::plugins::manifest::ManifestPlugin;
use crate::software::signature;
use crate::software::verify::verify_checksum;

/// One version in a vendor catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Version string understood by [`crate::software::version::Version::parse`].
    pub version: String,
    /// Downloadable artifacts, one per platform at most.
    pub files: Vec<AssetFile>,
}

impl Asset {
    /// Returns the artifact built for `platform`.
    #[must_use]
    pub fn file_for(&self, platform: Platform) -> Option<&AssetFile> {
        self.files
            .iter()
            .find(|file| file.os == platform.os && file.arch == platform.arch)
    }
}

/// A downloadable artifact of one catalog version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub url: String,
    /// Name the artifact is stored under in the downloads directory.
    pub file_name: String,
    pub os: Os,
    pub arch: Arch,
    pub package_type: PackageType,
    pub integrity: Integrity,
}

/// Material used to check a downloaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integrity {
    /// The vendor publishes nothing to check against.
    None,
    /// Expected SHA-256 digest, hex encoded.
    Sha256(String),
    /// Detached Ed25519 signature published at `url`.
    Signature { url: String },
}

/// A vendor catalog the installer can install tools from.
#[async_trait]
pub trait SoftwarePlugin: Send + Sync {
    /// Tool name, used on the command line and as the install directory.
    fn name(&self) -> &str;

    /// How extraction roots of this tool are named.
    fn naming_strategy(&self) -> NamingStrategy {
        NamingStrategy::UseArchiveTopLevelDirOrName
    }

    /// Lists every version in the vendor catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched or parsed.
    async fn available_assets(&self, downloader: &dyn Downloader) -> Result<Vec<Asset>>;

    /// Picks the artifact of `asset` to download on `platform`.
    fn download_url<'a>(&self, asset: &'a Asset, platform: Platform) -> Option<&'a AssetFile> {
        asset.file_for(platform)
    }

    /// Checks a downloaded artifact before it is extracted.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::ChecksumMismatch` or `ToolmanError::Authenticity`
    /// when the artifact does not match what the vendor published.
    async fn verify(
        &self,
        asset: &Asset,
        file: &AssetFile,
        package: &FetchedPackage,
        downloader: &dyn Downloader,
    ) -> Result<()>;

    /// Environment variables that activate an installed version.
    fn environment(&self, package: &InstalledPackage) -> Vec<EnvVar>;

    /// Runs after the package is recorded and its environment written.
    ///
    /// # Errors
    ///
    /// Returns an error if the hook fails; the install stays recorded.
    async fn post_install(&self, package: &InstalledPackage) -> Result<()> {
        let _ = package;
        Ok(())
    }
}

/// Checks `package` against the integrity material of `file`.
///
/// Signatures are fetched next to the artifact as `<file_name>.sig` and
/// checked against `keys`.
///
/// # Errors
///
/// Returns `ToolmanError::ChecksumMismatch`, `ToolmanError::Authenticity`,
/// or the error of fetching the signature.
pub async fn verify_integrity(
    file: &AssetFile,
    package: &FetchedPackage,
    downloader: &dyn Downloader,
    keys: &[PathBuf],
) -> Result<()> {
    match &file.integrity {
        Integrity::None => {
            warn!(url = %file.url, "vendor publishes no integrity material, skipping verification");
            Ok(())
        }
        Integrity::Sha256(expected) => verify_checksum(&package.file_path, expected),
        Integrity::Signature { url } => {
            let dest_dir = package
                .file_path
                .parent()
                .map_or_else(|| PathBuf::from("."), PathBuf::from);
            let signature_path = downloader
                .fetch(url, &dest_dir, &format!("{}.sig", file.file_name))
                .await?;
            debug!(signature = %signature_path.display(), keys = keys.len(), "checking signature");
            signature::verify_any(&package.file_path, &signature_path, keys)
                .await?
                .into_result(&package.file_path)
        }
    }
}

/// Plugins by tool name.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn SoftwarePlugin>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in Go plugin and every manifest
    /// tool defined in `config`.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Config` if the tool definitions are malformed.
    pub fn with_defaults(config: &ConfigFile) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(GoPlugin::from_env()));
        for plugin in ManifestPlugin::from_config(config)? {
            registry.register(Arc::new(plugin));
        }
        Ok(registry)
    }

    /// Registers `plugin`, replacing any plugin with the same name.
    pub fn register(&mut self, plugin: Arc<dyn SoftwarePlugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    /// Looks up the plugin for `name`.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::UnknownTool` if no plugin has that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn SoftwarePlugin>> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| ToolmanError::unknown_tool(name))
    }

    /// Returns the registered tool names in alphabetical order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::version::Version;
    use assert_fs::prelude::*;
    use std::path::Path;

    fn asset_file(os: Os, arch: Arch, integrity: Integrity) -> AssetFile {
        AssetFile {
            url: format!("https://example.com/tool-{}-{}.tar.gz", os.as_str(), arch.as_str()),
            file_name: format!("tool-{}-{}.tar.gz", os.as_str(), arch.as_str()),
            os,
            arch,
            package_type: PackageType::TarGz,
            integrity,
        }
    }

    fn fetched(path: &Path) -> FetchedPackage {
        FetchedPackage {
            version: Version::parse("1.0.0").expect("Should parse"),
            file_path: path.to_path_buf(),
            package_type: PackageType::TarGz,
        }
    }

    struct NoNetwork;

    #[async_trait]
    impl Downloader for NoNetwork {
        async fn fetch(&self, url: &str, _dest_dir: &Path, _file_name: &str) -> Result<PathBuf> {
            Err(ToolmanError::download(format!("unexpected fetch of {url}")))
        }

        async fn fetch_text(&self, url: &str) -> Result<String> {
            Err(ToolmanError::download(format!("unexpected fetch of {url}")))
        }
    }

    #[test]
    fn file_for_matches_os_and_arch() {
        let asset = Asset {
            version: "1.0.0".to_string(),
            files: vec![
                asset_file(Os::Linux, Arch::X64, Integrity::None),
                asset_file(Os::Macos, Arch::Arm64, Integrity::None),
            ],
        };

        let file = asset
            .file_for(Platform::new(Os::Macos, Arch::Arm64))
            .expect("Should find file");
        assert_eq!(file.os, Os::Macos);
        assert!(asset.file_for(Platform::new(Os::Windows, Arch::X64)).is_none());
    }

    #[tokio::test]
    async fn sha256_integrity_checks_digest() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let artifact = temp.child("tool.tar.gz");
        artifact.write_str("hello world\n").expect("Should write");
        let good = asset_file(
            Os::Linux,
            Arch::X64,
            Integrity::Sha256(
                "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447".to_string(),
            ),
        );
        let bad = asset_file(Os::Linux, Arch::X64, Integrity::Sha256("00".to_string()));

        verify_integrity(&good, &fetched(artifact.path()), &NoNetwork, &[])
            .await
            .expect("Should verify");
        let err = verify_integrity(&bad, &fetched(artifact.path()), &NoNetwork, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolmanError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn missing_integrity_material_is_accepted() {
        let file = asset_file(Os::Linux, Arch::X64, Integrity::None);
        verify_integrity(&file, &fetched(Path::new("/nonexistent")), &NoNetwork, &[])
            .await
            .expect("Should accept");
    }

    #[test]
    fn registry_lookup() {
        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(GoPlugin::new("https://example.com/dl")));

        assert_eq!(registry.names(), vec!["go"]);
        assert_eq!(registry.get("go").expect("Should find go").name(), "go");
        assert!(matches!(
            registry.get("rust"),
            Err(ToolmanError::UnknownTool { .. })
        ));
    }

    #[test]
    fn defaults_include_go_and_configured_tools() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let config_file = temp.child("config.json");
        config_file
            .write_str(r#"{"tools": {"node": {"manifest": "https://example.com/node.json"}}}"#)
            .expect("Should write config");
        let config = ConfigFile::load(config_file.path()).expect("Should load");

        let registry = PluginRegistry::with_defaults(&config).expect("Should build registry");

        assert_eq!(registry.names(), vec!["go", "node"]);
    }
}
