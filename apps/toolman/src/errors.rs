//! Error types for the toolman CLI.
//!
//! This module defines the `ToolmanError` enum returned by every operation of
//! the install pipeline. Command handlers wrap these in `anyhow::Error` so the
//! top-level handler can print the whole cause chain, while the pipeline
//! itself stays typed so callers can tell an already-installed version apart
//! from a corrupted download.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the `software` module.
pub type Result<T, E = ToolmanError> = std::result::Result<T, E>;

/// Consolidated error type for toolman operations.
#[derive(Debug, Error)]
pub enum ToolmanError {
    /// A version string could not be parsed.
    #[error("invalid version '{input}': {message}")]
    Parse {
        /// The text that failed to parse.
        input: String,
        /// What was wrong with it.
        message: String,
    },

    /// No catalog entry satisfies the requested version.
    #[error("no version found for {query}")]
    NotFound {
        /// The version query as the user typed it.
        query: String,
    },

    /// The requested version is already recorded in the tool's history.
    #[error("{tool} {version} is already installed")]
    AlreadyInstalled {
        /// Tool name.
        tool: String,
        /// Installed version.
        version: String,
    },

    /// The requested version is not recorded in the tool's history.
    #[error("{tool} {version} is not installed")]
    NotInstalled {
        /// Tool name.
        tool: String,
        /// Requested version.
        version: String,
    },

    /// No plugin is registered under the given name.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The tool name that was looked up.
        name: String,
    },

    /// The catalog has the version but no artifact for this machine.
    #[error("no {platform} artifact for {tool} {version}")]
    UnsupportedPlatform {
        /// Tool name.
        tool: String,
        /// Resolved version.
        version: String,
        /// Platform identifier, e.g. `linux-x64`.
        platform: String,
    },

    /// The archive container or one of its entries cannot be extracted.
    #[error("archive error: {message}")]
    ArchiveFormat {
        /// Description of the problem.
        message: String,
    },

    /// Error reading or writing files.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No trusted key verified the detached signature.
    #[error("authenticity check failed for {}: no trusted key verified the signature", path.display())]
    Authenticity {
        /// The file whose signature was rejected.
        path: PathBuf,
    },

    /// Checksum verification failed.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The expected checksum.
        expected: String,
        /// The actual checksum.
        actual: String,
    },

    /// Network error during download.
    #[error("download error: {message}")]
    Download {
        /// Description of the download error.
        message: String,
        /// The underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The configuration file is unreadable or holds malformed data.
    #[error("config error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl ToolmanError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Creates a new `AlreadyInstalled` error.
    #[must_use]
    pub fn already_installed(tool: impl Into<String>, version: impl Into<String>) -> Self {
        Self::AlreadyInstalled {
            tool: tool.into(),
            version: version.into(),
        }
    }

    /// Creates a new `NotInstalled` error.
    #[must_use]
    pub fn not_installed(tool: impl Into<String>, version: impl Into<String>) -> Self {
        Self::NotInstalled {
            tool: tool.into(),
            version: version.into(),
        }
    }

    /// Creates a new `UnknownTool` error.
    #[must_use]
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Creates a new `UnsupportedPlatform` error.
    #[must_use]
    pub fn unsupported_platform(
        tool: impl Into<String>,
        version: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self::UnsupportedPlatform {
            tool: tool.into(),
            version: version.into(),
            platform: platform.into(),
        }
    }

    /// Creates a new `ArchiveFormat` error.
    #[must_use]
    pub fn archive_format(message: impl Into<String>) -> Self {
        Self::ArchiveFormat {
            message: message.into(),
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `Authenticity` error.
    #[must_use]
    pub fn authenticity(path: impl Into<PathBuf>) -> Self {
        Self::Authenticity { path: path.into() }
    }

    /// Creates a new `ChecksumMismatch` error.
    #[must_use]
    pub fn checksum_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ChecksumMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `Download` error.
    #[must_use]
    pub fn download(message: impl Into<String>) -> Self {
        Self::Download {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Download` error with a source error.
    #[must_use]
    pub fn download_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Download {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Attaches a message to a `std::io::Result`, turning it into a `ToolmanError::Io`.
pub trait IoContext<T> {
    /// Wraps the error with the message produced by `message`.
    ///
    /// # Errors
    ///
    /// Returns `ToolmanError::Io` when `self` is an error.
    fn io_context<F>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, message: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| ToolmanError::io(message(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_displays_input_and_message() {
        let err = ToolmanError::parse("1.x", "component 'x' is not a number");
        assert_eq!(
            err.to_string(),
            "invalid version '1.x': component 'x' is not a number"
        );
    }

    #[test]
    fn not_found_displays_query() {
        let err = ToolmanError::not_found("99");
        assert_eq!(err.to_string(), "no version found for 99");
    }

    #[test]
    fn already_installed_displays_tool_and_version() {
        let err = ToolmanError::already_installed("go", "1.21.3");
        assert_eq!(err.to_string(), "go 1.21.3 is already installed");
    }

    #[test]
    fn unsupported_platform_displays_all_parts() {
        let err = ToolmanError::unsupported_platform("go", "1.2", "linux-x64");
        assert_eq!(err.to_string(), "no linux-x64 artifact for go 1.2");
    }

    #[test]
    fn checksum_mismatch_displays_both_values() {
        let err = ToolmanError::checksum_mismatch("abc123", "def456");
        assert_eq!(
            err.to_string(),
            "checksum mismatch: expected abc123, got def456"
        );
    }

    #[test]
    fn authenticity_displays_path() {
        let err = ToolmanError::authenticity("/tmp/go.tar.gz");
        assert!(err.to_string().contains("/tmp/go.tar.gz"));
    }

    #[test]
    fn io_context_wraps_source() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result
            .io_context(|| "Failed to open config".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "I/O error: Failed to open config");
        assert!(std::error::Error::source(&err).is_some());
    }
}
