//! Use command for the toolman CLI.
//!
//! Flags an installed version as the active one and regenerates the tool's
//! shell environment. New shells pick up the change; running shells need
//! to source the profile again.
//!
//! ## Usage
//!
//! ```bash
//! toolman use go 1.20.5
//! ```

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for the use command.
#[derive(Args)]
pub struct UseArgs {
    /// Tool to switch.
    pub tool: String,

    /// Exact installed version to activate.
    pub version: String,
}

/// Executes the use command.
///
/// # Errors
///
/// Returns an error if the version is not installed.
#[allow(clippy::unused_async)]
pub async fn execute(args: &UseArgs) -> Result<()> {
    let installer = super::installer()?;

    let active = installer
        .use_version(&args.tool, &args.version)
        .with_context(|| format!("Failed to switch {} to {}", args.tool, args.version))?;

    println!("Now using {} {}", args.tool, active.version);
    Ok(())
}
