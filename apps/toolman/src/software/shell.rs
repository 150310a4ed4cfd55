//! Shell integration: profile setup and rc file syntax.
//!
//! toolman never edits environment variables of a running shell. It writes
//! rc files (see [`crate::software::env`]) and makes the user's profile
//! source the aggregate script once:
//!
//! - Bash: `~/.bashrc` or `~/.bash_profile`
//! - Zsh: `~/.zshrc`
//! - Fish: `~/.config/fish/config.fish`
//!
//! ## Configuration Format
//!
//! For bash/zsh:
//! ```bash
//! # toolman
//! [ -f "$HOME/.toolman/env.sh" ] && . "$HOME/.toolman/env.sh"
//! ```
//!
//! For fish:
//! ```fish
//! # toolman
//! test -f '/home/user/.toolman/env.fish'; and source '/home/user/.toolman/env.fish'
//! ```

use std::path::{Path, PathBuf};

use crate::errors::{IoContext, Result};
use crate::software::env::EnvVar;
use crate::software::paths::SoftwarePaths;

/// Marker comment used to identify toolman's profile configuration.
const TOOLMAN_MARKER: &str = "# toolman";

/// Represents supported shell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

/// Syntax family of generated rc files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `sh`-compatible syntax, sourced by bash and zsh.
    Posix,
    /// fish syntax.
    Fish,
}

impl Shell {
    /// Detects the user's shell from the SHELL environment variable.
    ///
    /// Returns `None` if the shell cannot be determined or is not supported.
    #[must_use]
    pub fn detect() -> Option<Self> {
        let shell_path = std::env::var("SHELL").ok()?;
        Self::from_path(&shell_path)
    }

    /// Parses a shell from a path string (e.g., "/bin/bash").
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let shell_name = Path::new(path).file_name()?.to_str()?;
        match shell_name {
            "bash" => Some(Self::Bash),
            "zsh" => Some(Self::Zsh),
            "fish" => Some(Self::Fish),
            _ => None,
        }
    }

    /// Returns the profile files to check for this shell.
    #[must_use]
    pub fn profile_candidates(self, home_dir: &Path) -> Vec<PathBuf> {
        match self {
            Self::Bash => vec![home_dir.join(".bashrc"), home_dir.join(".bash_profile")],
            Self::Zsh => vec![home_dir.join(".zshrc")],
            Self::Fish => vec![home_dir.join(".config").join("fish").join("config.fish")],
        }
    }

    /// Returns the rc file syntax this shell sources.
    #[must_use]
    pub fn dialect(self) -> Dialect {
        match self {
            Self::Bash | Self::Zsh => Dialect::Posix,
            Self::Fish => Dialect::Fish,
        }
    }

    /// Command that reloads `profile_path` in a running shell.
    #[must_use]
    pub fn source_command(self, profile_path: &Path) -> String {
        match self.dialect() {
            Dialect::Posix => format!(". {}", profile_path.display()),
            Dialect::Fish => format!("source {}", profile_path.display()),
        }
    }
}

impl Dialect {
    /// Every dialect rc files are generated in.
    pub const ALL: [Self; 2] = [Self::Posix, Self::Fish];

    /// File extension of rc files in this dialect.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Posix => "sh",
            Self::Fish => "fish",
        }
    }

    /// Renders one environment variable assignment.
    #[must_use]
    pub fn export_line(self, var: &EnvVar) -> String {
        match (self, var) {
            (Self::Posix, EnvVar::Set { name, value }) => {
                format!("export {name}=\"{}\"", escape_posix(value))
            }
            (Self::Posix, EnvVar::PrependPath { name, value }) => {
                format!("export {name}=\"{}:${name}\"", escape_posix(value))
            }
            (Self::Fish, EnvVar::Set { name, value }) => {
                format!("set -gx {name} {}", quote_fish(value))
            }
            (Self::Fish, EnvVar::PrependPath { name, value }) => {
                format!("set -gx {name} {} ${name}", quote_fish(value))
            }
        }
    }

    /// Renders a line that sources `path` if it exists.
    #[must_use]
    pub fn source_line(self, path: &Path) -> String {
        let path = path.display().to_string();
        match self {
            Self::Posix => {
                let escaped = escape_posix(&path);
                format!("[ -f \"{escaped}\" ] && . \"{escaped}\"")
            }
            Self::Fish => {
                let quoted = quote_fish(&path);
                format!("test -f {quoted}; and source {quoted}")
            }
        }
    }
}

/// Escapes `$`, backticks, `"` and `\` for use within double quotes.
fn escape_posix(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('$', "\\$")
        .replace('`', "\\`")
        .replace('"', "\\\"")
}

fn quote_fish(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Result of attempting to configure the user's shell profile.
#[derive(Debug)]
pub enum ConfigureResult {
    /// The profile now sources toolman's aggregate script.
    Added {
        profile: PathBuf,
        source_command: String,
    },
    /// The profile already sources toolman's aggregate script.
    AlreadyConfigured { profile: PathBuf },
    /// No suitable profile file was found.
    NoProfileFound,
    /// Shell could not be detected.
    ShellNotDetected,
}

/// Makes the user's shell profile source toolman's aggregate script.
///
/// This function:
/// 1. Detects the user's shell
/// 2. Finds the appropriate profile file
/// 3. Checks if the profile is already configured
/// 4. Appends the configuration if needed
///
/// # Errors
///
/// Returns an error if file operations fail. Does not return an error
/// if the shell cannot be detected or no profile is found.
pub fn configure_profile(paths: &SoftwarePaths) -> Result<ConfigureResult> {
    let Some(shell) = Shell::detect() else {
        return Ok(ConfigureResult::ShellNotDetected);
    };

    let Some(home_dir) = dirs::home_dir() else {
        return Ok(ConfigureResult::NoProfileFound);
    };

    configure_profile_in(shell, &home_dir, paths)
}

/// Configures the profile of `shell` below `home_dir`.
///
/// # Errors
///
/// Returns an error if the profile cannot be read or written.
pub fn configure_profile_in(
    shell: Shell,
    home_dir: &Path,
    paths: &SoftwarePaths,
) -> Result<ConfigureResult> {
    let candidates = shell.profile_candidates(home_dir);

    let Some(profile_path) = find_existing_profile(&candidates) else {
        return Ok(ConfigureResult::NoProfileFound);
    };

    if is_profile_configured(&profile_path)? {
        return Ok(ConfigureResult::AlreadyConfigured {
            profile: profile_path,
        });
    }

    let dialect = shell.dialect();
    let snippet = format!(
        "\n{TOOLMAN_MARKER}\n{}\n",
        dialect.source_line(&paths.env_script(dialect.extension()))
    );
    append_to_file(&profile_path, &snippet)?;

    let source_command = shell.source_command(&profile_path);
    Ok(ConfigureResult::Added {
        profile: profile_path,
        source_command,
    })
}

/// Finds the first existing profile file from a list of candidates.
fn find_existing_profile(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}

fn is_profile_configured(profile_path: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(profile_path)
        .io_context(|| format!("Failed to read profile: {}", profile_path.display()))?;
    Ok(content.lines().any(|line| line.trim() == TOOLMAN_MARKER))
}

/// Appends content to a file.
fn append_to_file(path: &Path, content: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .io_context(|| format!("Failed to open profile for writing: {}", path.display()))?;

    file.write_all(content.as_bytes())
        .io_context(|| format!("Failed to write to profile: {}", path.display()))
}

/// Returns a human-readable message describing the configuration result.
#[must_use]
pub fn format_result_message(result: &ConfigureResult, paths: &SoftwarePaths) -> String {
    match result {
        ConfigureResult::Added {
            profile,
            source_command,
        } => {
            format!(
                "Configured {} to load toolman environments.\nRun '{source_command}' to use them in this shell.",
                profile.display()
            )
        }
        ConfigureResult::AlreadyConfigured { profile } => {
            format!("Shell profile already configured in {}", profile.display())
        }
        ConfigureResult::NoProfileFound => {
            format!(
                "Could not find shell profile. To use installed tools, add to your profile:\n  {}",
                Dialect::Posix.source_line(&paths.env_script(Dialect::Posix.extension()))
            )
        }
        ConfigureResult::ShellNotDetected => {
            format!(
                "Could not detect shell. To use installed tools, add to your profile:\n  {}",
                Dialect::Posix.source_line(&paths.env_script(Dialect::Posix.extension()))
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn shell_from_path() {
        assert_eq!(Shell::from_path("/bin/bash"), Some(Shell::Bash));
        assert_eq!(Shell::from_path("/usr/local/bin/zsh"), Some(Shell::Zsh));
        assert_eq!(Shell::from_path("/usr/bin/fish"), Some(Shell::Fish));
        assert_eq!(Shell::from_path("/bin/tcsh"), None);
        assert_eq!(Shell::from_path(""), None);
    }

    #[test]
    fn profile_candidates_bash() {
        let home = PathBuf::from("/home/user");
        let candidates = Shell::Bash.profile_candidates(&home);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/home/user/.bashrc"),
                PathBuf::from("/home/user/.bash_profile")
            ]
        );
    }

    #[test]
    fn profile_candidates_fish() {
        let home = PathBuf::from("/home/user");
        assert_eq!(
            Shell::Fish.profile_candidates(&home),
            vec![PathBuf::from("/home/user/.config/fish/config.fish")]
        );
    }

    #[test]
    fn source_command_matches_shell() {
        let profile = Path::new("/home/user/.zshrc");
        assert_eq!(Shell::Zsh.source_command(profile), ". /home/user/.zshrc");
        assert_eq!(
            Shell::Fish.source_command(Path::new("/home/user/.config/fish/config.fish")),
            "source /home/user/.config/fish/config.fish"
        );
    }

    #[test]
    fn posix_export_lines() {
        assert_eq!(
            Dialect::Posix.export_line(&EnvVar::set("GOROOT", "/opt/go")),
            "export GOROOT=\"/opt/go\""
        );
        assert_eq!(
            Dialect::Posix.export_line(&EnvVar::prepend_path("PATH", "/opt/go/bin")),
            "export PATH=\"/opt/go/bin:$PATH\""
        );
    }

    #[test]
    fn posix_export_escapes_special_chars() {
        let line = Dialect::Posix.export_line(&EnvVar::set("X", "/home/$USER/`x`/\"q\""));
        assert_eq!(line, r#"export X="/home/\$USER/\`x\`/\"q\"""#);
    }

    #[test]
    fn fish_export_lines() {
        assert_eq!(
            Dialect::Fish.export_line(&EnvVar::set("GOROOT", "/opt/go")),
            "set -gx GOROOT '/opt/go'"
        );
        assert_eq!(
            Dialect::Fish.export_line(&EnvVar::prepend_path("PATH", "/opt/it's/bin")),
            r"set -gx PATH '/opt/it\'s/bin' $PATH"
        );
    }

    #[test]
    fn source_lines_guard_missing_files() {
        let path = Path::new("/home/user/.toolman/env/go.sh");
        assert_eq!(
            Dialect::Posix.source_line(path),
            "[ -f \"/home/user/.toolman/env/go.sh\" ] && . \"/home/user/.toolman/env/go.sh\""
        );
        assert_eq!(
            Dialect::Fish.source_line(Path::new("/x/go.fish")),
            "test -f '/x/go.fish'; and source '/x/go.fish'"
        );
    }

    #[test]
    fn configure_profile_appends_once() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let bashrc = temp.child(".bashrc");
        bashrc.write_str("# existing\n").expect("Should write profile");
        let paths = SoftwarePaths::with_root(temp.path().join(".toolman"));

        let first = configure_profile_in(Shell::Bash, temp.path(), &paths).expect("Should configure");
        assert!(matches!(first, ConfigureResult::Added { .. }));

        let second =
            configure_profile_in(Shell::Bash, temp.path(), &paths).expect("Should configure");
        assert!(matches!(second, ConfigureResult::AlreadyConfigured { .. }));

        let content = std::fs::read_to_string(bashrc.path()).expect("Should read profile");
        assert!(content.starts_with("# existing\n"));
        assert_eq!(content.matches(TOOLMAN_MARKER).count(), 1);
        assert!(content.contains(&paths.env_script("sh").display().to_string()));
    }

    #[test]
    fn configure_profile_uses_fish_syntax() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let config = temp.child(".config/fish/config.fish");
        config.write_str("").expect("Should write profile");
        let paths = SoftwarePaths::with_root(temp.path().join(".toolman"));

        configure_profile_in(Shell::Fish, temp.path(), &paths).expect("Should configure");

        let content = std::fs::read_to_string(config.path()).expect("Should read profile");
        assert!(content.contains("; and source '"));
        assert!(content.contains("env.fish"));
    }

    #[test]
    fn configure_profile_without_profile_file() {
        let temp = assert_fs::TempDir::new().expect("Should create temp dir");
        let paths = SoftwarePaths::with_root(temp.path().join(".toolman"));

        let result = configure_profile_in(Shell::Zsh, temp.path(), &paths).expect("Should run");

        assert!(matches!(result, ConfigureResult::NoProfileFound));
        assert!(!temp.path().join(".zshrc").exists());
    }
}
