//! Checksum verification for downloaded artifacts.
//!
//! Vendors that publish a SHA-256 digest next to each artifact get a plain
//! equality check; signed catalogs go through [`super::signature`] instead.

use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::{IoContext, Result, ToolmanError};

/// Compares the SHA-256 digest of `file_path` with the hex digest the
/// vendor published. Case and surrounding whitespace of `expected` are
/// ignored.
///
/// # Errors
///
/// Returns `ToolmanError::ChecksumMismatch` when the digests differ, or
/// `ToolmanError::Io` if the file cannot be read.
pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<()> {
    let expected = expected.trim().to_ascii_lowercase();
    let actual = compute_sha256(file_path)?;

    if actual == expected {
        debug!(file = %file_path.display(), "checksum verified");
        Ok(())
    } else {
        Err(ToolmanError::checksum_mismatch(expected, actual))
    }
}

/// Streams `file_path` through SHA-256 and returns the lowercase hex digest.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut file = File::open(file_path)
        .io_context(|| format!("Failed to open {} for hashing", file_path.display()))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .io_context(|| format!("Failed to hash {}", file_path.display()))?;

    Ok(hex::encode(hasher.finalize()))
}
