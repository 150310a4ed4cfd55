//! Build script for the toolman CLI.
//!
//! Embeds the short git commit hash so `toolman --version` can report
//! which revision a binary was built from.

use std::process::Command;

fn main() {
    let commit = short_commit().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=TOOLMAN_GIT_COMMIT={commit}");

    if let Some(top_level) = git(&["rev-parse", "--show-toplevel"]) {
        println!("cargo:rerun-if-changed={top_level}/.git/HEAD");
    }
}

fn short_commit() -> Option<String> {
    git(&["rev-parse", "--short", "HEAD"])
}

/// Runs git with the given arguments and returns trimmed stdout on success.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;

    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}
