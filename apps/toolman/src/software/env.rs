//! Generated shell rc files.
//!
//! Each tool with an active version gets one rc file per [`Dialect`] under
//! `<root>/env/`, holding the exports of its main version. The aggregate
//! scripts `<root>/env.sh` and `<root>/env.fish` source every per-tool file
//! and are what the user's profile loads.
//!
//! Files are rewritten from scratch every time, never patched.

use std::path::PathBuf;

use tracing::debug;

use crate::errors::{IoContext, Result};
use crate::software::paths::SoftwarePaths;
use crate::software::shell::Dialect;
use crate::software::version::Version;

const GENERATED_HEADER: &str = "# Generated by toolman. Do not edit.";

/// One environment variable a tool needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvVar {
    /// Sets `name` to `value`.
    Set { name: String, value: String },
    /// Prepends `value` to the search-path variable `name`.
    PrependPath { name: String, value: String },
}

impl EnvVar {
    /// Creates an assignment.
    #[must_use]
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a search-path prepend.
    #[must_use]
    pub fn prepend_path(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::PrependPath {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Writes per-tool rc files and keeps the aggregate scripts current.
#[derive(Debug, Clone)]
pub struct EnvWriter {
    paths: SoftwarePaths,
}

impl EnvWriter {
    #[must_use]
    pub fn new(paths: SoftwarePaths) -> Self {
        Self { paths }
    }

    /// Replaces the rc files of `tool` with the exports of `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn write_tool(&self, tool: &str, version: &Version, vars: &[EnvVar]) -> Result<()> {
        std::fs::create_dir_all(&self.paths.env)
            .io_context(|| format!("Failed to create directory: {}", self.paths.env.display()))?;

        for dialect in Dialect::ALL {
            let mut content = format!("{GENERATED_HEADER}\n# {tool} {version}\n");
            for var in vars {
                content.push_str(&dialect.export_line(var));
                content.push('\n');
            }

            let file = self.paths.env_file(tool, dialect.extension());
            std::fs::write(&file, content)
                .io_context(|| format!("Failed to write {}", file.display()))?;
        }

        debug!(%tool, %version, vars = vars.len(), "wrote environment");
        self.write_aggregates()
    }

    /// Deletes the rc files of `tool`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn remove_tool(&self, tool: &str) -> Result<()> {
        for dialect in Dialect::ALL {
            let file = self.paths.env_file(tool, dialect.extension());
            if file.exists() {
                std::fs::remove_file(&file)
                    .io_context(|| format!("Failed to remove {}", file.display()))?;
            }
        }

        debug!(%tool, "removed environment");
        self.write_aggregates()
    }

    /// Rewrites `env.sh` and `env.fish` to source every per-tool file.
    fn write_aggregates(&self) -> Result<()> {
        for dialect in Dialect::ALL {
            let mut content = format!("{GENERATED_HEADER}\n");
            for file in self.tool_files(dialect)? {
                content.push_str(&dialect.source_line(&file));
                content.push('\n');
            }

            let script = self.paths.env_script(dialect.extension());
            std::fs::write(&script, content)
                .io_context(|| format!("Failed to write {}", script.display()))?;
        }
        Ok(())
    }

    fn tool_files(&self, dialect: Dialect) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.paths.env)
            .io_context(|| format!("Failed to read directory: {}", self.paths.env.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .io_context(|| format!("Failed to read entry in {}", self.paths.env.display()))?
                .path();
            if path.extension().is_some_and(|ext| ext == dialect.extension()) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}
