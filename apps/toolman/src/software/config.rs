//! Key-value configuration stored in `<root>/config.json`.
//!
//! The file is a single JSON object. Top-level keys in use:
//!
//! - `tools`: manifest-backed tool definitions, see
//!   [`crate::software::plugins::manifest`]
//! - `history.<tool>`: install history of one tool, see
//!   [`crate::software::history`]
//!
//! A missing file reads as empty. Nothing locks the file; concurrent
//! toolman processes may overwrite each other's changes.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::errors::{IoContext, Result, ToolmanError};

/// In-memory view of the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    values: Map<String, Value>,
}

impl ConfigFile {
    /// Loads the configuration at `path`, or an empty one if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Io` if the file exists but cannot be read and
    /// `ToolmanError::Config` if it is not a JSON object.
    pub fn load(path: &Path) -> Result<Self> {
        let values = match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                ToolmanError::config(format!("{} is not a JSON object: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(ToolmanError::io(
                    format!("Failed to read config: {}", path.display()),
                    e,
                ));
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Config` if the stored value has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    ToolmanError::config(format!(
                        "malformed value for '{key}' in {}: {e}",
                        self.path.display()
                    ))
                })
            })
            .transpose()
    }

    /// Stores `value` under `key`. Call [`ConfigFile::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Config` if `value` cannot be represented as JSON.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ToolmanError::config(format!("cannot store '{key}': {e}")))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Removes `key`. Call [`ConfigFile::save`] to persist.
    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    /// Writes the configuration back to disk, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Io` if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .io_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let text = serde_json::to_string_pretty(&self.values)
            .map_err(|e| ToolmanError::config(format!("cannot serialize config: {e}")))?;
        std::fs::write(&self.path, text + "\n")
            .io_context(|| format!("Failed to write config: {}", self.path.display()))
    }
}
