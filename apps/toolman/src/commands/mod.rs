//! Command modules for the toolman CLI.
//!
//! ## Installation Commands
//!
//! - [`install`] - Install a tool version
//! - [`uninstall`] - Remove a tool version
//! - [`use_cmd`] - Activate an installed version
//!
//! ## Query Commands
//!
//! - [`list`] - List installed versions
//! - [`versions`] - List versions available in a catalog
//! - [`tools`] - List installable tools

pub mod install;
pub mod list;
pub mod tools;
pub mod uninstall;
pub mod use_cmd;
pub mod versions;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::software::config::ConfigFile;
use crate::software::download::HttpDownloader;
use crate::software::plugin::PluginRegistry;
use crate::software::{Installer, Platform, SoftwarePaths};

/// Builds the installer from the environment: root directory, configured
/// tools, HTTP downloader and the current platform.
///
/// # Errors
///
/// Returns an error if the root directory cannot be determined, the
/// configuration is malformed, or the platform is unsupported.
pub fn installer() -> Result<Installer> {
    let paths = SoftwarePaths::new()?;
    let config = ConfigFile::load(&paths.config_file())?;
    let registry = PluginRegistry::with_defaults(&config)
        .with_context(|| format!("Failed to load tools from {}", paths.config_file().display()))?;
    let mut downloader = HttpDownloader::new()?;
    if !std::io::stdout().is_terminal() {
        downloader = downloader.quiet();
    }
    let platform = Platform::detect()?;

    Ok(Installer::new(paths, registry, Arc::new(downloader), platform))
}
