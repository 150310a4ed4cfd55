//! Path management for toolman.
//!
//! The default root directory is `~/.toolman/`, which can be overridden by
//! setting the `TOOLMAN_HOME` environment variable.
//!
//! ## Directory Structure
//!
//! ```text
//! ~/.toolman/                   # Root directory (or TOOLMAN_HOME)
//!   software/                   # Installed tools
//!     go/                       # One directory per tool
//!       go1.21.3.linux-amd64/   # Extraction root of one version
//!   downloads/                  # Downloaded artifacts, per tool
//!   env/                        # Generated per-tool rc files
//!     go.sh                     # POSIX syntax
//!     go.fish                   # fish syntax
//!   env.sh                      # Sources every env/*.sh
//!   env.fish                    # Sources every env/*.fish
//!   config.json                 # Key-value configuration and history
//! ```

use std::path::PathBuf;

use crate::errors::{IoContext, Result, ToolmanError};

/// Environment variable to override the default root directory.
pub const TOOLMAN_HOME_ENV: &str = "TOOLMAN_HOME";

/// Name of the key-value configuration file.
const CONFIG_FILE: &str = "config.json";

/// Stem of the aggregate scripts sourced by the user's profile.
const ENV_SCRIPT_STEM: &str = "env";

/// Manages paths for tool installations.
#[derive(Debug, Clone)]
pub struct SoftwarePaths {
    /// Root directory for all toolman data (`~/.toolman` or `TOOLMAN_HOME`).
    pub root: PathBuf,
    /// Directory containing one subdirectory per installed tool.
    pub software: PathBuf,
    /// Directory for downloaded artifacts.
    pub downloads: PathBuf,
    /// Directory for generated per-tool rc files.
    pub env: PathBuf,
}

impl SoftwarePaths {
    /// Creates a new `SoftwarePaths` instance.
    ///
    /// The root directory is determined by:
    /// 1. The `TOOLMAN_HOME` environment variable if set
    /// 2. On Windows: `%APPDATA%\toolman`
    /// 3. On Unix: `~/.toolman` in the user's home directory
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        let root = if let Ok(home) = std::env::var(TOOLMAN_HOME_ENV)
            && !home.trim().is_empty()
        {
            PathBuf::from(home)
        } else {
            #[cfg(windows)]
            {
                dirs::data_dir()
                    .ok_or_else(|| {
                        ToolmanError::config(
                            "Cannot determine AppData directory. Set TOOLMAN_HOME environment variable.",
                        )
                    })?
                    .join("toolman")
            }
            #[cfg(not(windows))]
            {
                dirs::home_dir()
                    .ok_or_else(|| {
                        ToolmanError::config(
                            "Cannot determine home directory. Set TOOLMAN_HOME environment variable.",
                        )
                    })?
                    .join(".toolman")
            }
        };

        Ok(Self::with_root(root))
    }

    /// Creates a new `SoftwarePaths` instance with a specific root directory.
    #[must_use = "returns new paths instance without side effects"]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            software: root.join("software"),
            downloads: root.join("downloads"),
            env: root.join("env"),
            root,
        }
    }

    /// Returns the directory holding every installed version of `tool`.
    #[must_use = "returns the path without side effects"]
    pub fn tool_dir(&self, tool: &str) -> PathBuf {
        self.software.join(tool)
    }

    /// Returns the directory downloads for `tool` are written to.
    #[must_use = "returns the path without side effects"]
    pub fn download_dir(&self, tool: &str) -> PathBuf {
        self.downloads.join(tool)
    }

    /// Returns the generated rc file for `tool` with the given extension.
    #[must_use = "returns the path without side effects"]
    pub fn env_file(&self, tool: &str, extension: &str) -> PathBuf {
        self.env.join(format!("{tool}.{extension}"))
    }

    /// Returns the aggregate script that sources every per-tool rc file.
    #[must_use = "returns the path without side effects"]
    pub fn env_script(&self, extension: &str) -> PathBuf {
        self.root.join(format!("{ENV_SCRIPT_STEM}.{extension}"))
    }

    /// Returns the key-value configuration file.
    #[must_use = "returns the path without side effects"]
    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Ensures all required directories exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.root, &self.software, &self.downloads, &self.env] {
            std::fs::create_dir_all(dir)
                .io_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}
