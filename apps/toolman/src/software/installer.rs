//! The install pipeline.
//!
//! ## Install Process
//!
//! 1. Parse the requested version, failing fast on malformed input
//! 2. Refuse a version already in the tool's history, before any network access
//! 3. Resolve the request against the vendor catalog and check the resolved
//!    version against history again
//! 4. Download the artifact for this platform
//! 5. Verify it (checksum or signature) unless verification is disabled
//! 6. Extract it below `software/<tool>/` using the plugin's naming strategy
//! 7. Record it in history, not flagged main
//! 8. Rewrite the tool's rc files and run the plugin's post-install hook
//!
//! Nothing is rolled back: a failure after extraction can leave an
//! unrecorded directory behind, which a later install overwrites.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{IoContext, Result, ToolmanError};
use crate::software::archive;
use crate::software::download::Downloader;
use crate::software::env::EnvWriter;
use crate::software::history::{History, HistoryStore};
use crate::software::package::{FetchedPackage, InstalledPackage};
use crate::software::paths::SoftwarePaths;
use crate::software::platform::Platform;
use crate::software::plugin::{PluginRegistry, SoftwarePlugin};
use crate::software::resolver;
use crate::software::version::Version;

/// Switches for a single install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// Check the artifact's checksum or signature before extracting it.
    pub verify: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// Installs, removes and activates tool versions.
pub struct Installer {
    paths: SoftwarePaths,
    registry: PluginRegistry,
    downloader: Arc<dyn Downloader>,
    history: HistoryStore,
    env: EnvWriter,
    platform: Platform,
}

impl Installer {
    #[must_use]
    pub fn new(
        paths: SoftwarePaths,
        registry: PluginRegistry,
        downloader: Arc<dyn Downloader>,
        platform: Platform,
    ) -> Self {
        Self {
            history: HistoryStore::new(paths.config_file()),
            env: EnvWriter::new(paths.clone()),
            paths,
            registry,
            downloader,
            platform,
        }
    }

    /// Returns the directory layout.
    #[must_use]
    pub fn paths(&self) -> &SoftwarePaths {
        &self.paths
    }

    /// Returns the plugin registry.
    #[must_use]
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Installs the newest version of `tool` matching `requested`.
    ///
    /// An empty `requested` means the newest version in the catalog.
    ///
    /// # Errors
    ///
    /// - `UnknownTool` if no plugin is registered for `tool`
    /// - `Parse` if `requested` or a catalog version is malformed
    /// - `AlreadyInstalled` if the requested or resolved version is in history
    /// - `NotFound` if no catalog version matches
    /// - `UnsupportedPlatform` if the version has no artifact for this machine
    /// - `Download`, `ChecksumMismatch`, `Authenticity`, `ArchiveFormat` or
    ///   `Io` from the pipeline stages
    pub async fn install(
        &self,
        tool: &str,
        requested: &str,
        options: InstallOptions,
    ) -> Result<InstalledPackage> {
        let plugin = self.registry.get(tool)?;
        let wanted = Version::parse(requested)?;
        if wanted.is_any() {
            debug!(%tool, "no version requested, resolving the newest");
        }

        let mut history = self.history.read(tool)?;
        if history.contains(&wanted) {
            return Err(ToolmanError::already_installed(tool, wanted.to_string()));
        }

        let assets = plugin.available_assets(self.downloader.as_ref()).await?;
        let catalog: Vec<&str> = assets.iter().map(|asset| asset.version.as_str()).collect();
        let (version, index) = resolver::find_version(requested, &catalog)?;

        if history.contains(&version) {
            return Err(ToolmanError::already_installed(tool, version.to_string()));
        }

        let asset = &assets[index];
        let file = plugin
            .download_url(asset, self.platform)
            .ok_or_else(|| {
                ToolmanError::unsupported_platform(tool, version.to_string(), self.platform.to_string())
            })?;

        self.paths.ensure_directories()?;
        info!(%tool, %version, url = %file.url, "installing");

        let file_path = self
            .downloader
            .fetch(&file.url, &self.paths.download_dir(tool), &file.file_name)
            .await?;
        let package = FetchedPackage {
            version,
            file_path,
            package_type: file.package_type,
        };

        if options.verify {
            plugin
                .verify(asset, file, &package, self.downloader.as_ref())
                .await?;
        } else {
            warn!(%tool, version = %package.version, "skipping verification");
        }

        let extracted = archive::extract(
            &package,
            &self.paths.tool_dir(tool),
            plugin.naming_strategy(),
        )?;

        let installed = InstalledPackage::from_extracted(extracted);
        history.push(installed.clone());
        self.history.write(&history)?;

        self.materialize(plugin.as_ref(), &history)?;
        plugin.post_install(&installed).await?;

        info!(%tool, version = %installed.version, path = %installed.path.display(), "installed");
        Ok(installed)
    }

    /// Removes an installed version and its directory tree.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` if `version` is not in the tool's history, or
    /// an I/O error if the directory cannot be removed.
    pub async fn uninstall(&self, tool: &str, version: &str) -> Result<InstalledPackage> {
        let plugin = self.registry.get(tool)?;
        let version = Version::parse(version)?;

        let mut history = self.history.read(tool)?;
        let removed = history
            .remove(&version)
            .ok_or_else(|| ToolmanError::not_installed(tool, version.to_string()))?;

        if removed.path.exists() {
            tokio::fs::remove_dir_all(&removed.path)
                .await
                .io_context(|| format!("Failed to remove {}", removed.path.display()))?;
        } else {
            debug!(path = %removed.path.display(), "install directory already gone");
        }

        self.history.write(&history)?;
        self.materialize(plugin.as_ref(), &history)?;

        info!(%tool, %version, "uninstalled");
        Ok(removed)
    }

    /// Makes `version` the active version of `tool`.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` if `version` is not in the tool's history.
    pub fn use_version(&self, tool: &str, version: &str) -> Result<InstalledPackage> {
        let plugin = self.registry.get(tool)?;
        let version = Version::parse(version)?;

        let mut history = self.history.read(tool)?;
        if !history.set_main(&version) {
            return Err(ToolmanError::not_installed(tool, version.to_string()));
        }

        self.history.write(&history)?;
        self.materialize(plugin.as_ref(), &history)?;

        history
            .find(&version)
            .cloned()
            .ok_or_else(|| ToolmanError::not_installed(tool, version.to_string()))
    }

    /// Returns the install history of `tool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read.
    pub fn installed(&self, tool: &str) -> Result<History> {
        self.history.read(tool)
    }

    /// Returns the catalog versions of `tool`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool is unknown or the catalog cannot be fetched.
    pub async fn available(&self, tool: &str) -> Result<Vec<Version>> {
        let plugin = self.registry.get(tool)?;
        let assets = plugin.available_assets(self.downloader.as_ref()).await?;
        let catalog: Vec<&str> = assets.iter().map(|asset| asset.version.as_str()).collect();
        Ok(resolver::sorted_newest_first(&catalog))
    }

    /// Rewrites the rc files of a tool for its current main version.
    fn materialize(&self, plugin: &dyn SoftwarePlugin, history: &History) -> Result<()> {
        match history.main_version() {
            Some(main) => {
                self.env
                    .write_tool(&history.name, &main.version, &plugin.environment(main))
            }
            None => self.env.remove_tool(&history.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::platform::{Arch, Os};
    use crate::software::plugins::manifest::{EnvTemplate, ManifestPlugin, ToolDefinition};
    use crate::software::archive::NamingStrategy;
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MANIFEST_URL: &str = "https://example.com/tool/manifest.json";

    /// Serves canned responses and counts every request.
    #[derive(Default)]
    struct FakeDownloader {
        responses: HashMap<String, Vec<u8>>,
        text_calls: AtomicUsize,
        file_calls: AtomicUsize,
    }

    impl FakeDownloader {
        fn network_calls(&self) -> usize {
            self.text_calls.load(Ordering::SeqCst) + self.file_calls.load(Ordering::SeqCst)
        }

        fn file_calls(&self) -> usize {
            self.file_calls.load(Ordering::SeqCst)
        }

        fn reset(&self) {
            self.text_calls.store(0, Ordering::SeqCst);
            self.file_calls.store(0, Ordering::SeqCst);
        }

        fn body(&self, url: &str) -> Result<&Vec<u8>> {
            self.responses
                .get(url)
                .ok_or_else(|| ToolmanError::download(format!("HTTP error 404 Not Found: {url}")))
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn fetch(&self, url: &str, dest_dir: &Path, file_name: &str) -> Result<PathBuf> {
            self.file_calls.fetch_add(1, Ordering::SeqCst);
            let body = self.body(url)?;
            std::fs::create_dir_all(dest_dir).expect("Should create download dir");
            let dest = dest_dir.join(file_name);
            std::fs::write(&dest, body).expect("Should write download");
            Ok(dest)
        }

        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            Ok(String::from_utf8(self.body(url)?.clone()).expect("Should be UTF-8"))
        }
    }

    fn tool_archive(version: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder
            .append_data(&mut header, format!("tool-{version}/"), std::io::empty())
            .expect("Should append dir");

        let content = format!("tool {version}");
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        builder
            .append_data(
                &mut header,
                format!("tool-{version}/bin/tool"),
                content.as_bytes(),
            )
            .expect("Should append");
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip")
    }

    fn archive_url(version: &str, os: &str) -> String {
        format!("https://example.com/tool/tool-{version}-{os}-x64.tar.gz")
    }

    struct Fixture {
        _temp: assert_fs::TempDir,
        paths: SoftwarePaths,
        downloader: Arc<FakeDownloader>,
        installer: Installer,
    }

    /// Serves versions 1.0.0 and 1.1.0 for linux-x64. `corrupt` versions get
    /// a wrong checksum in the manifest; 2.0.0 exists for macOS only.
    fn fixture(corrupt: &[&str]) -> Fixture {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let paths = SoftwarePaths::with_root(temp.path().join("home"));

        let mut responses = HashMap::new();
        let mut releases = Vec::new();
        for version in ["1.0.0", "1.1.0"] {
            let archive = tool_archive(version);
            let digest = if corrupt.contains(&version) {
                "0".repeat(64)
            } else {
                hex::encode(Sha256::digest(&archive))
            };
            let url = archive_url(version, "linux");
            releases.push(serde_json::json!({
                "version": version,
                "files": [{"url": url, "os": "linux", "arch": "x64", "sha256": digest}]
            }));
            responses.insert(url, archive);
        }
        releases.push(serde_json::json!({
            "version": "2.0.0",
            "files": [{"url": archive_url("2.0.0", "darwin"), "os": "darwin", "arch": "x64"}]
        }));
        responses.insert(
            MANIFEST_URL.to_string(),
            serde_json::to_vec(&releases).expect("Should serialize manifest"),
        );

        let downloader = Arc::new(FakeDownloader {
            responses,
            ..FakeDownloader::default()
        });

        let mut registry = PluginRegistry::new();
        registry.register(Arc::new(ManifestPlugin::new(
            "tool",
            ToolDefinition {
                manifest: MANIFEST_URL.to_string(),
                naming: NamingStrategy::UseArchiveTopLevelDirOrName,
                keys: Vec::new(),
                env: vec![EnvTemplate {
                    name: "PATH".to_string(),
                    value: "{path}/bin".to_string(),
                    prepend: true,
                }],
            },
        )));

        let installer = Installer::new(
            paths.clone(),
            registry,
            downloader.clone(),
            Platform::new(Os::Linux, Arch::X64),
        );

        Fixture {
            _temp: temp,
            paths,
            downloader,
            installer,
        }
    }

    #[tokio::test]
    async fn install_extracts_records_and_writes_environment() {
        let fx = fixture(&[]);

        let installed = fx
            .installer
            .install("tool", "1", InstallOptions::default())
            .await
            .expect("Should install");

        assert_eq!(installed.version.as_str(), "1.1.0");
        assert!(!installed.main);
        assert_eq!(installed.path, fx.paths.tool_dir("tool").join("tool-1.1.0"));
        assert!(installed.path.join("bin").join("tool").is_file());

        let history = fx.installer.installed("tool").expect("Should read history");
        assert_eq!(history.items, vec![installed.clone()]);

        let rc = std::fs::read_to_string(fx.paths.env_file("tool", "sh")).expect("Should read rc");
        assert!(rc.contains(&format!("{}/bin", installed.path.display())));
    }

    #[tokio::test]
    async fn reinstalling_same_version_fails_without_network() {
        let fx = fixture(&[]);
        fx.installer
            .install("tool", "1.1.0", InstallOptions::default())
            .await
            .expect("Should install");
        fx.downloader.reset();

        let err = fx
            .installer
            .install("tool", "1.1.0", InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolmanError::AlreadyInstalled { .. }));
        assert_eq!(fx.downloader.network_calls(), 0);
    }

    #[tokio::test]
    async fn resolved_version_already_installed_fails_before_download() {
        let fx = fixture(&[]);
        fx.installer
            .install("tool", "1.1.0", InstallOptions::default())
            .await
            .expect("Should install");
        fx.downloader.reset();

        let err = fx
            .installer
            .install("tool", "1", InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolmanError::AlreadyInstalled { .. }));
        assert_eq!(fx.downloader.file_calls(), 0);
    }

    #[tokio::test]
    async fn checksum_mismatch_aborts_before_extraction() {
        let fx = fixture(&["1.1.0"]);

        let err = fx
            .installer
            .install("tool", "1.1", InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolmanError::ChecksumMismatch { .. }));
        assert!(!fx.paths.tool_dir("tool").join("tool-1.1.0").exists());
        assert!(fx.installer.installed("tool").expect("Should read").items.is_empty());
    }

    #[tokio::test]
    async fn disabled_verification_installs_corrupt_checksum() {
        let fx = fixture(&["1.1.0"]);

        let installed = fx
            .installer
            .install("tool", "1.1", InstallOptions { verify: false })
            .await
            .expect("Should install");

        assert_eq!(installed.version.as_str(), "1.1.0");
    }

    #[tokio::test]
    async fn missing_platform_artifact_is_unsupported() {
        let fx = fixture(&[]);

        let err = fx
            .installer
            .install("tool", "2", InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolmanError::UnsupportedPlatform { .. }));
        assert_eq!(fx.downloader.file_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_version_and_tool() {
        let fx = fixture(&[]);

        let not_found = fx
            .installer
            .install("tool", "99", InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(not_found, ToolmanError::NotFound { .. }));

        let unknown = fx
            .installer
            .install("rust", "", InstallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(unknown, ToolmanError::UnknownTool { .. }));
        assert_eq!(fx.downloader.network_calls(), 1);
    }

    #[tokio::test]
    async fn malformed_request_fails_before_network() {
        let fx = fixture(&[]);

        let err = fx
            .installer
            .install("tool", "1.x", InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ToolmanError::Parse { .. }));
        assert_eq!(fx.downloader.network_calls(), 0);
    }

    #[tokio::test]
    async fn uninstall_removes_directory_history_and_environment() {
        let fx = fixture(&[]);
        let installed = fx
            .installer
            .install("tool", "1.0.0", InstallOptions::default())
            .await
            .expect("Should install");

        let removed = fx
            .installer
            .uninstall("tool", "1.0.0")
            .await
            .expect("Should uninstall");

        assert_eq!(removed.path, installed.path);
        assert!(!installed.path.exists());
        assert!(fx.installer.installed("tool").expect("Should read").items.is_empty());
        assert!(!fx.paths.env_file("tool", "sh").exists());
    }

    #[tokio::test]
    async fn uninstall_of_missing_version_is_not_installed() {
        let fx = fixture(&[]);

        let err = fx.installer.uninstall("tool", "1.0.0").await.unwrap_err();

        assert!(matches!(err, ToolmanError::NotInstalled { .. }));
    }

    #[tokio::test]
    async fn use_version_switches_environment() {
        let fx = fixture(&[]);
        let old = fx
            .installer
            .install("tool", "1.0.0", InstallOptions::default())
            .await
            .expect("Should install 1.0.0");
        fx.installer
            .install("tool", "1.1.0", InstallOptions::default())
            .await
            .expect("Should install 1.1.0");

        let rc_path = fx.paths.env_file("tool", "sh");
        let rc = std::fs::read_to_string(&rc_path).expect("Should read rc");
        assert!(rc.contains("tool-1.1.0"));

        let active = fx
            .installer
            .use_version("tool", "1.0.0")
            .expect("Should switch");
        assert!(active.main);
        assert_eq!(active.path, old.path);

        let rc = std::fs::read_to_string(&rc_path).expect("Should read rc");
        assert!(rc.contains("tool-1.0.0"));
        assert!(!rc.contains("tool-1.1.0"));

        let err = fx.installer.use_version("tool", "3.0.0").unwrap_err();
        assert!(matches!(err, ToolmanError::NotInstalled { .. }));
    }

    #[tokio::test]
    async fn available_lists_newest_first() {
        let fx = fixture(&[]);

        let versions = fx.installer.available("tool").await.expect("Should list");

        let names: Vec<&str> = versions.iter().map(Version::as_str).collect();
        assert_eq!(names, vec!["2.0.0", "1.1.0", "1.0.0"]);
    }
}
