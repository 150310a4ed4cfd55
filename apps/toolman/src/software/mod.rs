//! Tool acquisition and materialization.
//!
//! This module provides everything between a version request on the command
//! line and an activated tool on disk.
//!
//! ## Modules
//!
//! - [`version`] - Four-component version model
//! - [`resolver`] - Partial version matching against a catalog
//! - [`download`] - Streaming HTTP downloads
//! - [`verify`] - SHA-256 checksum verification
//! - [`signature`] - Concurrent detached-signature verification
//! - [`archive`] - tar.gz and zip extraction
//! - [`installer`] - The install pipeline
//! - [`plugin`] / [`plugins`] - Vendor catalogs
//! - [`history`] / [`config`] - Persistent state
//! - [`env`] / [`shell`] - Shell environment files
//! - [`paths`] / [`platform`] - Directory layout and platform detection

pub mod archive;
pub mod config;
pub mod download;
pub mod env;
pub mod history;
pub mod installer;
pub mod package;
pub mod paths;
pub mod platform;
pub mod plugin;
pub mod plugins;
pub mod resolver;
pub mod shell;
pub mod signature;
pub mod verify;
pub mod version;

pub use installer::{InstallOptions, Installer};
pub use paths::SoftwarePaths;
pub use platform::Platform;
