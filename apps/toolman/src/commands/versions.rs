//! Versions command for the toolman CLI.
//!
//! Lists the versions a tool's catalog offers, newest first.
//!
//! ## Usage
//!
//! ```bash
//! toolman versions go
//! toolman versions go --installed
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Available go versions:
//!
//!   1.22.0
//!   1.21.3 (installed)
//!   1.21.2
//! ```

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for the versions command.
#[derive(Args)]
pub struct VersionsArgs {
    /// Tool whose catalog to query.
    pub tool: String,

    /// Show only versions that are installed.
    #[clap(long, short = 'i')]
    pub installed: bool,
}

/// Executes the versions command.
///
/// # Errors
///
/// Returns an error if the tool is unknown or its catalog cannot be fetched.
pub async fn execute(args: &VersionsArgs) -> Result<()> {
    let installer = super::installer()?;
    let history = installer.installed(&args.tool)?;
    let versions = installer
        .available(&args.tool)
        .await
        .with_context(|| format!("Failed to fetch {} versions", args.tool))?;

    let rows: Vec<_> = versions
        .iter()
        .map(|version| (version, history.contains(version)))
        .filter(|(_, installed)| *installed || !args.installed)
        .collect();

    if rows.is_empty() {
        println!("No {} versions found.", args.tool);
        return Ok(());
    }

    println!("Available {} versions:", args.tool);
    println!();
    for (version, installed) in rows {
        if installed {
            println!("  {version} (installed)");
        } else {
            println!("  {version}");
        }
    }

    Ok(())
}
