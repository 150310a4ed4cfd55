//! Tools command for the toolman CLI.
//!
//! Lists the tools toolman knows how to install: the built-in ones and
//! those declared under `tools` in `config.json`.
//!
//! ## Usage
//!
//! ```bash
//! toolman tools
//! ```

use anyhow::Result;

/// Executes the tools command.
///
/// # Errors
///
/// Returns an error if the configuration file is malformed.
#[allow(clippy::unused_async)]
pub async fn execute() -> Result<()> {
    let installer = super::installer()?;

    println!("Available tools:");
    println!();
    for name in installer.registry().names() {
        let installed = installer.installed(name)?.items.len();
        if installed == 0 {
            println!("  {name}");
        } else {
            println!("  {name} ({installed} installed)");
        }
    }

    Ok(())
}
