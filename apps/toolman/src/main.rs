#![warn(clippy::pedantic)]

//! # toolman
//!
//! A command-line manager for developer tool versions. `toolman` downloads
//! vendor releases, verifies them, unpacks them below its root directory and
//! generates shell scripts that put the active version of every tool on
//! `PATH`.
//!
//! ## Subcommands
//!
//! - `install` - Install a tool version
//! - `uninstall` - Remove a tool version
//! - `use` - Activate an installed version
//! - `list` - List installed versions
//! - `versions` - List versions a tool's catalog offers
//! - `tools` - List installable tools
//!
//! ## Layout
//!
//! ```text
//! ~/.toolman/
//! ├── config.json          # Install history and tool definitions
//! ├── env.sh / env.fish    # Sourced by the shell profile
//! ├── env/<tool>.sh        # Environment of the active version of <tool>
//! ├── downloads/<tool>/    # Fetched artifacts
//! └── software/<tool>/     # Extracted installs, one directory per version
//! ```
//!
//! ## Examples
//!
//! Install the newest Go 1.21 release:
//! ```bash
//! toolman install go 1.21
//! ```
//!
//! Switch to another installed version:
//! ```bash
//! toolman use go 1.20.5
//! ```

mod commands;
mod errors;
mod software;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{install, list, tools, uninstall, use_cmd, versions};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TOOLMAN_LOG";

/// Command-line tool version manager.
#[derive(Parser)]
#[command(
    name = "toolman",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TOOLMAN_GIT_COMMIT"), ")"),
    about = "Install and switch between versions of developer tools",
    after_help = "\
ENVIRONMENT VARIABLES:
    TOOLMAN_HOME            Root directory (default: ~/.toolman)
    TOOLMAN_LOG             Log filter, e.g. 'debug' or 'toolman=trace' (default: warn)
    TOOLMAN_GO_DIST         Go release catalog URL (default: https://go.dev/dl/?mode=json&include=all)"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the toolman CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install a tool version.
    ///
    /// Resolves a possibly partial version against the tool's catalog,
    /// downloads and verifies the artifact for this platform and extracts it.
    /// If no version is given, installs the newest one.
    Install(install::InstallArgs),

    /// Uninstall a tool version.
    ///
    /// Removes the version's directory and its history entry.
    Uninstall(uninstall::UninstallArgs),

    /// Activate an installed version.
    ///
    /// Regenerates the tool's environment scripts for that version.
    #[command(name = "use")]
    Use(use_cmd::UseArgs),

    /// List installed versions.
    ///
    /// Marks the active version of each tool with an asterisk.
    List(list::ListArgs),

    /// List versions available for a tool.
    ///
    /// Fetches the tool's catalog and prints its versions, newest first.
    Versions(versions::VersionsArgs),

    /// List installable tools.
    Tools,
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Sends diagnostics to stderr, filtered by `TOOLMAN_LOG`.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Prints the error with its cause chain and returns the exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    1
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Install(args) => install::execute(&args).await,
        Commands::Uninstall(args) => uninstall::execute(&args).await,
        Commands::Use(args) => use_cmd::execute(&args).await,
        Commands::List(args) => list::execute(&args).await,
        Commands::Versions(args) => versions::execute(&args).await,
        Commands::Tools => tools::execute().await,
    }
}
