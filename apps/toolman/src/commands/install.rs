//! Install command for the toolman CLI.
//!
//! Downloads, verifies and extracts a tool version, then records it and
//! regenerates the tool's shell environment.
//!
//! ## Usage
//!
//! ```bash
//! toolman install go             # Newest Go release
//! toolman install go 1.21        # Newest 1.21.x release
//! toolman install go 1.21.3      # Exactly 1.21.3
//! toolman install node --no-verify
//! ```

use anyhow::{Context, Result};
use clap::Args;

use crate::software::InstallOptions;
use crate::software::shell::{self, ConfigureResult};

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Tool to install (see `toolman tools`).
    pub tool: String,

    /// Version to install, possibly partial (e.g., "1.21").
    ///
    /// If omitted, installs the newest version in the catalog.
    pub version: Option<String>,

    /// Skip checksum and signature verification.
    #[clap(long = "no-verify", action = clap::ArgAction::SetTrue)]
    pub no_verify: bool,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if the version is already installed, cannot be found,
/// or any stage of the install pipeline fails.
pub async fn execute(args: &InstallArgs) -> Result<()> {
    let installer = super::installer()?;
    let requested = args.version.as_deref().unwrap_or_default();
    let first_install = !installer.paths().env_script("sh").exists();
    let options = InstallOptions {
        verify: !args.no_verify,
    };

    if requested.is_empty() {
        println!("Installing latest {}...", args.tool);
    } else {
        println!("Installing {} {requested}...", args.tool);
    }

    let installed = installer
        .install(&args.tool, requested, options)
        .await
        .with_context(|| format!("Failed to install {}", args.tool))?;

    println!(
        "Installed {} {} to {}",
        args.tool,
        installed.version,
        installed.path.display()
    );

    let history = installer.installed(&args.tool)?;
    if let Some(main) = history.main_version()
        && main.version != installed.version
    {
        println!(
            "{} {} is active. Run 'toolman use {} {}' to switch.",
            args.tool, main.version, args.tool, installed.version
        );
    }

    if first_install {
        configure_shell_profile(&installer);
    }
    Ok(())
}

/// Makes the user's shell profile load toolman environments.
fn configure_shell_profile(installer: &crate::software::Installer) {
    match shell::configure_profile(installer.paths()) {
        Ok(ConfigureResult::AlreadyConfigured { .. }) => {}
        Ok(result) => {
            println!();
            println!("{}", shell::format_result_message(&result, installer.paths()));
        }
        Err(e) => {
            eprintln!("Warning: Could not configure shell profile automatically: {e}");
        }
    }
}
