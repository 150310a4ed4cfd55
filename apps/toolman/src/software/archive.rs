//! Archive extraction for downloaded artifacts.
//!
//! Extracts tar.gz and zip archives under an *extraction root* inside the
//! destination directory. The root's name depends on a [`NamingStrategy`]:
//!
//! | Archive                         | Strategy                            | Root             |
//! |---------------------------------|-------------------------------------|------------------|
//! | `some-dir.tar.gz` holding `dir/`| `UseArchiveTopLevelDirOrName`       | `<dest>/dir`     |
//! | `some-dir.tar.gz` holding `dir/`| `ReplaceTopLevelDirWithArchiveName` | `<dest>/some-dir`|
//! | `flat.zip` holding `a`, `b`     | either                              | `<dest>/flat`    |
//!
//! Both formats go through the same entry handling: directories are created
//! with mode 0755, regular files are truncated and rewritten, any executable
//! bit in the source mode becomes owner-execute on disk, and symlinks are
//! recreated with their stored target. Zip stores a symlink target as the
//! entry's contents, tar stores it in the header.
//!
//! The top-level directory is the one directory *entry* at the top of the
//! archive. Archives without such an entry are flat, even when every file
//! shares a first path component.
//!
//! Entries are processed in archive order. Missing parent directories are
//! created, so archives that omit directory entries still extract. No entry
//! is written through a symlink, and an existing file or symlink at an
//! entry's path is replaced rather than written through.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tar::{Archive, EntryType};
use tracing::debug;

use crate::errors::{IoContext, Result, ToolmanError};
use crate::software::package::{ExtractedPackage, FetchedPackage, PackageType};

/// File type mask of a Unix mode.
const S_IFMT: u32 = 0o170_000;
/// Directory file type.
const S_IFDIR: u32 = 0o040_000;
/// Regular file type.
const S_IFREG: u32 = 0o100_000;
/// Symbolic link file type.
const S_IFLNK: u32 = 0o120_000;

/// Any of the user, group or other execute bits.
const ANY_EXECUTE: u32 = 0o111;
/// Owner execute bit.
const OWNER_EXECUTE: u32 = 0o100;

/// How the extraction root below the destination directory is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamingStrategy {
    /// Use the archive's single top-level directory if it has one, otherwise
    /// the archive file name without its compression suffix.
    #[default]
    #[serde(rename = "top-level-dir")]
    UseArchiveTopLevelDirOrName,
    /// Always use the archive file name, stripping any top-level directory.
    ///
    /// For vendors whose archives always contain the same folder (`go/`),
    /// this keeps versions apart on disk.
    #[serde(rename = "archive-name")]
    ReplaceTopLevelDirWithArchiveName,
}

/// What an archive entry turns into on disk.
enum EntryKind {
    Directory,
    File { mode: u32 },
    Symlink { target: String },
}

/// Where entries land: the extraction root plus the prefix stripped from
/// entry names.
#[derive(Debug)]
struct Layout {
    root: PathBuf,
    top_level_dir: Option<String>,
}

impl Layout {
    fn new(
        archive_path: &Path,
        dest_dir: &Path,
        top_level_dir: Option<String>,
        strategy: NamingStrategy,
    ) -> Result<Self> {
        let root = match (strategy, &top_level_dir) {
            (NamingStrategy::UseArchiveTopLevelDirOrName, Some(dir)) => dest_dir.join(dir),
            _ => dest_dir.join(archive_stem(archive_path)?),
        };
        Ok(Self {
            root,
            top_level_dir,
        })
    }

    /// Maps an entry name to its path below the extraction root.
    fn target(&self, name: &str) -> Result<PathBuf> {
        let normalized = normalize_entry_name(name);
        let relative = match &self.top_level_dir {
            Some(top) if normalized == top => "",
            Some(top) => normalized
                .strip_prefix(top.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(normalized),
            None => normalized,
        };

        if relative.is_empty() {
            return Ok(self.root.clone());
        }

        // Entries must stay below the root.
        let relative = Path::new(relative);
        if relative.is_absolute()
            || relative.components().any(|c| {
                matches!(
                    c,
                    Component::ParentDir | Component::RootDir | Component::Prefix(_)
                )
            })
        {
            return Err(ToolmanError::archive_format(format!(
                "Refusing to extract path with parent directory or absolute reference: {name}"
            )));
        }

        Ok(self.root.join(relative))
    }
}

/// Extracts a fetched package below `dest_dir`.
///
/// # Errors
///
/// Returns `ToolmanError::ArchiveFormat` if the package type is not an
/// archive this module understands, if the container is corrupt, or if an
/// entry has an unsupported type or unsafe path. Returns `ToolmanError::Io`
/// if writing to disk fails. Nothing is cleaned up on failure.
pub fn extract(
    package: &FetchedPackage,
    dest_dir: &Path,
    strategy: NamingStrategy,
) -> Result<ExtractedPackage> {
    let root = match package.package_type {
        PackageType::TarGz => extract_tar_gz(&package.file_path, dest_dir, strategy)?,
        PackageType::Zip => extract_zip(&package.file_path, dest_dir, strategy)?,
        other => {
            return Err(ToolmanError::archive_format(format!(
                "unsupported package type '{other}' for {}",
                package.file_path.display()
            )));
        }
    };

    debug!(
        archive = %package.file_path.display(),
        root = %root.display(),
        ?strategy,
        "extracted package"
    );

    Ok(ExtractedPackage {
        version: package.version.clone(),
        path: root,
    })
}

/// Extracts a tar.gz archive and returns the extraction root.
///
/// # Errors
///
/// See [`extract`].
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
    strategy: NamingStrategy,
) -> Result<PathBuf> {
    let top_level_dir = find_top_level_dir(&scan_tar_gz(archive_path)?);
    let layout = Layout::new(archive_path, dest_dir, top_level_dir, strategy)?;
    create_dir(&layout.root)?;

    let mut archive = open_tar_gz(archive_path)?;
    let entries = archive
        .entries()
        .map_err(|e| corrupt(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| corrupt(archive_path, e))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

        let kind = match entry.header().entry_type() {
            EntryType::Directory => EntryKind::Directory,
            EntryType::Regular | EntryType::Continuous => EntryKind::File {
                mode: entry.header().mode().unwrap_or(0),
            },
            EntryType::Symlink => {
                let target = entry
                    .link_name_bytes()
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .ok_or_else(|| {
                        ToolmanError::archive_format(format!("symlink '{name}' has no target"))
                    })?;
                EntryKind::Symlink { target }
            }
            // pax global headers carry archive metadata only.
            EntryType::XGlobalHeader => continue,
            other => {
                return Err(ToolmanError::archive_format(format!(
                    "unsupported entry type {other:?} for '{name}' in {}",
                    archive_path.display()
                )));
            }
        };

        unpack_entry(&layout, &name, kind, &mut entry)?;
    }

    Ok(layout.root)
}

/// Extracts a zip archive and returns the extraction root.
///
/// # Errors
///
/// See [`extract`].
pub fn extract_zip(archive_path: &Path, dest_dir: &Path, strategy: NamingStrategy) -> Result<PathBuf> {
    let file = std::fs::File::open(archive_path)
        .io_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(archive_path, e))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| corrupt(archive_path, e))?;
        names.push((entry.name().to_string(), entry.is_dir()));
    }

    let layout = Layout::new(archive_path, dest_dir, find_top_level_dir(&names), strategy)?;
    create_dir(&layout.root)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| corrupt(archive_path, e))?;
        let name = entry.name().to_string();
        let mode = entry.unix_mode().unwrap_or(0);
        let file_type = mode & S_IFMT;

        let kind = if entry.is_dir() || file_type == S_IFDIR {
            EntryKind::Directory
        } else {
            match file_type {
                S_IFLNK => {
                    let mut target = String::new();
                    entry
                        .read_to_string(&mut target)
                        .map_err(|e| corrupt(archive_path, e))?;
                    EntryKind::Symlink { target }
                }
                0 | S_IFREG => EntryKind::File { mode },
                other => {
                    return Err(ToolmanError::archive_format(format!(
                        "unsupported entry type {other:#o} for '{name}' in {}",
                        archive_path.display()
                    )));
                }
            }
        };

        unpack_entry(&layout, &name, kind, &mut entry)?;
    }

    Ok(layout.root)
}

/// Returns the archive file name without its compression suffix.
///
/// `.tar.gz` is stripped as one unit; otherwise only the last extension is.
///
/// # Errors
///
/// Returns an error if the path has no file name.
pub fn archive_stem(archive_path: &Path) -> Result<String> {
    let file_name = archive_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ToolmanError::archive_format(format!(
                "archive path has no file name: {}",
                archive_path.display()
            ))
        })?;

    if file_name.to_ascii_lowercase().ends_with(".tar.gz") {
        return Ok(file_name[..file_name.len() - ".tar.gz".len()].to_string());
    }

    Ok(Path::new(&file_name)
        .file_stem()
        .map_or(file_name.clone(), |stem| stem.to_string_lossy().into_owned()))
}

/// Finds the single top-level directory entry.
///
/// Only entries listed as directories count, and only those whose name has
/// no further `/`. Files at the top level do not disqualify the directory.
fn find_top_level_dir(entries: &[(String, bool)]) -> Option<String> {
    let mut candidates = entries
        .iter()
        .filter(|(_, is_dir)| *is_dir)
        .map(|(name, _)| normalize_entry_name(name))
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .collect::<BTreeSet<_>>();

    if candidates.len() == 1 {
        candidates.pop_first().map(str::to_string)
    } else {
        None
    }
}

/// Strips a trailing slash and any leading `./` from an entry name.
fn normalize_entry_name(name: &str) -> &str {
    let mut name = name.trim_end_matches('/');
    while let Some(rest) = name.strip_prefix("./") {
        name = rest;
    }
    if name == "." { "" } else { name }
}

fn open_tar_gz(archive_path: &Path) -> Result<Archive<GzDecoder<std::fs::File>>> {
    let file = std::fs::File::open(archive_path)
        .io_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    Ok(Archive::new(GzDecoder::new(file)))
}

/// Lists entry names and whether each is a directory.
fn scan_tar_gz(archive_path: &Path) -> Result<Vec<(String, bool)>> {
    let mut archive = open_tar_gz(archive_path)?;
    let mut names = Vec::new();

    for entry in archive
        .entries()
        .map_err(|e| corrupt(archive_path, e))?
    {
        let entry = entry.map_err(|e| corrupt(archive_path, e))?;
        let entry_type = entry.header().entry_type();
        if entry_type == EntryType::XGlobalHeader {
            continue;
        }
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        names.push((name, entry_type.is_dir()));
    }

    Ok(names)
}

fn corrupt(archive_path: &Path, err: impl Display) -> ToolmanError {
    ToolmanError::archive_format(format!(
        "Failed to read archive {}: {err}",
        archive_path.display()
    ))
}

fn unpack_entry(layout: &Layout, name: &str, kind: EntryKind, contents: &mut dyn Read) -> Result<()> {
    let path = layout.target(name)?;
    reject_symlinked_parents(&layout.root, &path, name)?;

    match kind {
        EntryKind::Directory => create_dir(&path),
        EntryKind::File { mode } => {
            create_parent(&path)?;
            remove_existing(&path)?;
            write_file(&path, contents, mode)
        }
        EntryKind::Symlink { target } => {
            create_parent(&path)?;
            remove_existing(&path)?;
            create_symlink(&target, &path)
        }
    }
}

/// Fails if any directory between `root` and `path` is a symlink.
///
/// An earlier symlink entry could otherwise redirect later entries outside
/// the extraction root.
fn reject_symlinked_parents(root: &Path, path: &Path, name: &str) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let Ok(relative) = parent.strip_prefix(root) else {
        return Ok(());
    };

    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        if current
            .symlink_metadata()
            .is_ok_and(|meta| meta.file_type().is_symlink())
        {
            return Err(ToolmanError::archive_format(format!(
                "Refusing to extract '{name}' through symlink {}",
                current.display()
            )));
        }
    }
    Ok(())
}

/// Removes a file or symlink left at `path` by an earlier extraction.
fn remove_existing(path: &Path) -> Result<()> {
    match path.symlink_metadata() {
        Ok(meta) if !meta.is_dir() => std::fs::remove_file(path)
            .io_context(|| format!("Failed to replace existing entry: {}", path.display())),
        _ => Ok(()),
    }
}

fn create_dir(path: &Path) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(path)
        .io_context(|| format!("Failed to create directory: {}", path.display()))
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.is_dir() => create_dir(parent),
        _ => Ok(()),
    }
}

fn write_file(path: &Path, contents: &mut dyn Read, mode: u32) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .io_context(|| format!("Failed to create file: {}", path.display()))?;
    std::io::copy(contents, &mut file)
        .io_context(|| format!("Failed to extract: {}", path.display()))?;

    if mode & ANY_EXECUTE != 0 {
        set_owner_executable(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .io_context(|| format!("Failed to get metadata: {}", path.display()))?
        .permissions();
    perms.set_mode(perms.mode() | OWNER_EXECUTE);
    std::fs::set_permissions(path, perms)
        .io_context(|| format!("Failed to set permissions: {}", path.display()))
}

#[cfg(windows)]
#[allow(clippy::unnecessary_wraps)]
fn set_owner_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn create_symlink(target: &str, path: &Path) -> Result<()> {
    #[cfg(unix)]
    let linked = std::os::unix::fs::symlink(target, path);
    #[cfg(windows)]
    let linked = std::os::windows::fs::symlink_file(target, path);

    linked.io_context(|| format!("Failed to create symlink {} -> {target}", path.display()))
}
