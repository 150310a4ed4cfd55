//! Per-tool install history.
//!
//! Each tool's history lives under the `history.<tool>` key of the
//! configuration file:
//!
//! ```json
//! {
//!   "history.go": {
//!     "name": "go",
//!     "items": [
//!       { "version": "1.21.3", "path": "...", "installedOn": 1700000000000, "main": false }
//!     ]
//!   }
//! }
//! ```
//!
//! Items are kept in install order and a version appears at most once.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::software::config::ConfigFile;
use crate::software::package::InstalledPackage;
use crate::software::version::Version;

/// Installed versions of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    /// Tool name.
    pub name: String,
    /// Installed versions, oldest install first.
    pub items: Vec<InstalledPackage>,
}

impl History {
    /// Creates an empty history for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    /// Returns the item recorded for `version`.
    #[must_use]
    pub fn find(&self, version: &Version) -> Option<&InstalledPackage> {
        self.items.iter().find(|item| &item.version == version)
    }

    /// Returns whether `version` is recorded.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        self.find(version).is_some()
    }

    /// Records a new install.
    pub fn push(&mut self, item: InstalledPackage) {
        self.items.push(item);
    }

    /// Removes and returns the item recorded for `version`.
    pub fn remove(&mut self, version: &Version) -> Option<InstalledPackage> {
        let index = self.items.iter().position(|item| &item.version == version)?;
        Some(self.items.remove(index))
    }

    /// Flags `version` as the main version and clears the flag on every
    /// other item. Returns `false` if `version` is not recorded.
    pub fn set_main(&mut self, version: &Version) -> bool {
        if !self.contains(version) {
            return false;
        }
        for item in &mut self.items {
            item.main = &item.version == version;
        }
        true
    }

    /// Returns the version whose environment is active.
    ///
    /// The most recently installed of the items flagged main wins; without
    /// any flagged item, the highest installed version does.
    #[must_use]
    pub fn main_version(&self) -> Option<&InstalledPackage> {
        let flagged = self
            .items
            .iter()
            .filter(|item| item.main)
            .max_by_key(|item| item.installed_on);

        flagged.or_else(|| self.items.iter().max_by(|a, b| a.version.cmp(&b.version)))
    }
}

/// Reads and writes histories in the configuration file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    config_path: PathBuf,
}

impl HistoryStore {
    /// Creates a store backed by the configuration file at `config_path`.
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Reads the history of `tool`, empty if nothing was ever installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or the
    /// stored history is malformed.
    pub fn read(&self, tool: &str) -> Result<History> {
        let config = ConfigFile::load(&self.config_path)?;
        Ok(config
            .get::<History>(&history_key(tool))?
            .unwrap_or_else(|| History::new(tool)))
    }

    /// Persists `history`, dropping the key once the history is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or written.
    pub fn write(&self, history: &History) -> Result<()> {
        let mut config = ConfigFile::load(&self.config_path)?;
        let key = history_key(&history.name);
        if history.items.is_empty() {
            config.remove(&key);
        } else {
            config.set(&key, history)?;
        }
        config.save()
    }
}

fn history_key(tool: &str) -> String {
    format!("history.{tool}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(version: &str, installed_on: i64, main: bool) -> InstalledPackage {
        InstalledPackage {
            version: Version::parse(version).expect("Should parse"),
            path: PathBuf::from(format!("/opt/go/{version}")),
            installed_on,
            main,
        }
    }

    fn history(items: Vec<InstalledPackage>) -> History {
        History {
            name: "go".to_string(),
            items,
        }
    }

    #[test]
    fn main_version_prefers_latest_flagged_item() {
        let history = history(vec![
            item("1.22.0", 100, true),
            item("1.20.0", 300, true),
            item("1.21.0", 200, false),
        ]);

        let main = history.main_version().expect("Should have a main version");
        assert_eq!(main.version.as_str(), "1.20.0");
    }

    #[test]
    fn main_version_falls_back_to_highest_version() {
        let history = history(vec![
            item("1.20.0", 300, false),
            item("1.22.1", 100, false),
            item("1.21.0", 200, false),
        ]);

        let main = history.main_version().expect("Should have a main version");
        assert_eq!(main.version.as_str(), "1.22.1");
    }

    #[test]
    fn main_version_of_empty_history_is_none() {
        assert!(History::new("go").main_version().is_none());
    }

    #[test]
    fn set_main_clears_other_flags() {
        let mut history = history(vec![item("1.20.0", 1, true), item("1.21.0", 2, false)]);
        let target = Version::parse("1.21.0").expect("Should parse");

        assert!(history.set_main(&target));

        assert!(!history.items[0].main);
        assert!(history.items[1].main);
        assert!(!history.set_main(&Version::parse("9.9").expect("Should parse")));
    }

    #[test]
    fn contains_requires_exact_components() {
        let history = history(vec![item("1.21.0", 1, false)]);
        assert!(history.contains(&Version::parse("v1.21.0").expect("Should parse")));
        assert!(!history.contains(&Version::parse("1.21").expect("Should parse")));
    }

    #[test]
    fn remove_returns_item() {
        let mut history = history(vec![item("1.20.0", 1, false), item("1.21.0", 2, false)]);
        let removed = history
            .remove(&Version::parse("1.20.0").expect("Should parse"))
            .expect("Should remove");
        assert_eq!(removed.version.as_str(), "1.20.0");
        assert_eq!(history.items.len(), 1);
    }

    #[test]
    fn store_round_trips_through_config_file() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let config_path = temp.path().join("config.json");
        let store = HistoryStore::new(&config_path);

        let mut go = store.read("go").expect("Should read");
        assert!(go.items.is_empty());
        go.push(item("1.21.3", 42, false));
        store.write(&go).expect("Should write");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&config_path).expect("Should read"))
                .expect("Should be JSON");
        assert_eq!(raw["history.go"]["name"], "go");
        assert_eq!(raw["history.go"]["items"][0]["version"], "1.21.3");
        assert_eq!(raw["history.go"]["items"][0]["installedOn"], 42);

        assert_eq!(store.read("go").expect("Should reread"), go);
    }

    #[test]
    fn writing_empty_history_drops_key() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let config_path = temp.path().join("config.json");
        let store = HistoryStore::new(&config_path);

        let mut go = History::new("go");
        go.push(item("1.21.3", 42, false));
        store.write(&go).expect("Should write");
        go.items.clear();
        store.write(&go).expect("Should write");

        let raw = std::fs::read_to_string(&config_path).expect("Should read");
        assert!(!raw.contains("history.go"));
    }

    #[test]
    fn store_keeps_unrelated_keys() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let config_path = temp.path().join("config.json");
        std::fs::write(&config_path, r#"{"tools": {}}"#).expect("Should write");
        let store = HistoryStore::new(&config_path);

        let mut go = History::new("go");
        go.push(item("1.21.3", 42, false));
        store.write(&go).expect("Should write");

        let raw = std::fs::read_to_string(&config_path).expect("Should read");
        assert!(raw.contains("\"tools\""));
    }
}
