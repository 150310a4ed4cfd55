//! List command for the toolman CLI.
//!
//! Displays installed versions and marks the active one.
//!
//! ## Usage
//!
//! ```bash
//! toolman list        # Every tool
//! toolman list go     # Only Go
//! ```
//!
//! ## Output Format
//!
//! ```text
//! go:
//!   1.20.5    (installed 12 days ago)
//! * 1.21.3    (main, installed today)
//! ```

use anyhow::Result;
use clap::Args;

use crate::software::history::History;
use crate::software::package::now_millis;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Only list this tool.
    pub tool: Option<String>,
}

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the tool is unknown or the configuration file
/// cannot be read.
#[allow(clippy::unused_async)]
pub async fn execute(args: &ListArgs) -> Result<()> {
    let installer = super::installer()?;

    let tools = match &args.tool {
        Some(tool) => {
            installer.registry().get(tool)?;
            vec![tool.as_str()]
        }
        None => installer.registry().names(),
    };

    let mut histories = Vec::new();
    for tool in tools {
        let history = installer.installed(tool)?;
        if !history.items.is_empty() {
            histories.push(history);
        }
    }

    if histories.is_empty() {
        println!("No tools installed.");
        println!();
        println!("Run 'toolman install <tool>' to install one.");
        return Ok(());
    }

    let now = now_millis();
    for (i, history) in histories.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_history(history, now);
    }

    Ok(())
}

fn print_history(history: &History, now: i64) {
    println!("{}:", history.name);

    let main = history.main_version().map(|item| &item.version);
    let mut items: Vec<_> = history.items.iter().collect();
    items.sort_by(|a, b| a.version.cmp(&b.version));

    for item in items {
        let is_main = main == Some(&item.version);
        let marker = if is_main { "*" } else { " " };
        let age = installed_ago(item.installed_on, now);
        if is_main {
            println!("{marker} {}    (main, installed {age})", item.version);
        } else {
            println!("{marker} {}    (installed {age})", item.version);
        }
    }
}

/// Formats the distance between two millisecond timestamps in whole days.
fn installed_ago(installed_on: i64, now: i64) -> String {
    let days = (now - installed_on).max(0) / MILLIS_PER_DAY;
    match days {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        n => format!("{n} days ago"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn installed_ago_today() {
        assert_eq!(installed_ago(NOW, NOW), "today");
        assert_eq!(installed_ago(NOW - MILLIS_PER_DAY + 1, NOW), "today");
    }

    #[test]
    fn installed_ago_yesterday() {
        assert_eq!(installed_ago(NOW - MILLIS_PER_DAY, NOW), "yesterday");
    }

    #[test]
    fn installed_ago_many_days() {
        assert_eq!(installed_ago(NOW - 12 * MILLIS_PER_DAY, NOW), "12 days ago");
    }

    #[test]
    fn installed_ago_clock_skew_is_today() {
        assert_eq!(installed_ago(NOW + MILLIS_PER_DAY, NOW), "today");
    }
}
