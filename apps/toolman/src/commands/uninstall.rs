//! Uninstall command for the toolman CLI.
//!
//! Removes an installed version, its directory tree and its history entry.
//! If it was the active version, the next one in line becomes active.
//!
//! ## Usage
//!
//! ```bash
//! toolman uninstall go 1.21.3
//! ```

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Tool to uninstall from.
    pub tool: String,

    /// Exact installed version to remove (e.g., "1.21.3").
    pub version: String,
}

/// Executes the uninstall command.
///
/// # Errors
///
/// Returns an error if the version is not installed or its directory
/// cannot be removed.
pub async fn execute(args: &UninstallArgs) -> Result<()> {
    let installer = super::installer()?;

    let removed = installer
        .uninstall(&args.tool, &args.version)
        .await
        .with_context(|| format!("Failed to uninstall {} {}", args.tool, args.version))?;

    println!("Uninstalled {} {}", args.tool, removed.version);

    match installer.installed(&args.tool)?.main_version() {
        Some(main) => println!("Active {} version: {}", args.tool, main.version),
        None => println!("No {} versions remain installed.", args.tool),
    }

    Ok(())
}
