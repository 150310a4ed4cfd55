//! Detached signature verification against several trusted keys.
//!
//! Every trusted key file is checked in its own task. The first key that
//! verifies the signature settles the outcome as [`Authenticity::Authentic`];
//! the remaining tasks run to completion in the background and their
//! results are dropped. Only when every key has failed is the file
//! [`Authenticity::Corrupted`].
//!
//! ## Formats
//!
//! A key file is a keyring: one Ed25519 public key per line, hex or base64
//! encoded. Blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! # release signing key, 2024
//! 3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c
//! PUAXw+hDiVqStwqnTRt+vJyYLM8uxJaMwM1V8Sr0Zgw=
//! ```
//!
//! A signature file holds the 64 raw signature bytes, or the same bytes as
//! hex or base64 text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::{IoContext, Result, ToolmanError};

/// Outcome of checking a file against its detached signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authenticity {
    /// At least one trusted key verified the signature.
    Authentic,
    /// No trusted key verified the signature.
    Corrupted,
}

impl Authenticity {
    /// Turns `Corrupted` into `ToolmanError::Authenticity` for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is corrupted.
    pub fn into_result(self, path: &Path) -> Result<()> {
        match self {
            Self::Authentic => Ok(()),
            Self::Corrupted => Err(ToolmanError::authenticity(path)),
        }
    }
}

/// Why a single key file did not verify the signature.
#[derive(Debug, Error)]
enum KeyringError {
    #[error("cannot read key file: {0}")]
    Read(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("key file holds no keys")]
    Empty,

    #[error("no key in the keyring verified the signature")]
    NoMatch,
}

/// Verifies `file` against the detached `signature` using every key file in
/// `keys` concurrently.
///
/// Returns on the first key that verifies, without waiting for the others.
/// A malformed signature or an empty key list yields `Corrupted`.
///
/// # Errors
///
/// Returns `ToolmanError::Io` if `file` or `signature` cannot be read.
/// Failures of individual key files only count as a failed key.
pub async fn verify_any(file: &Path, signature: &Path, keys: &[PathBuf]) -> Result<Authenticity> {
    if keys.is_empty() {
        warn!(file = %file.display(), "no trusted keys configured");
        return Ok(Authenticity::Corrupted);
    }

    let message: Arc<[u8]> = tokio::fs::read(file)
        .await
        .io_context(|| format!("Failed to read {}", file.display()))?
        .into();
    let raw_signature = tokio::fs::read(signature)
        .await
        .io_context(|| format!("Failed to read signature {}", signature.display()))?;

    let signature = match parse_signature(&raw_signature) {
        Ok(signature) => signature,
        Err(reason) => {
            warn!(signature = %signature.display(), %reason, "malformed signature");
            return Ok(Authenticity::Corrupted);
        }
    };

    let (tx, mut rx) = mpsc::channel(keys.len());
    for key in keys {
        let tx = tx.clone();
        let message = Arc::clone(&message);
        let key = key.clone();
        tokio::spawn(async move {
            let outcome = verify_with_keyring(&key, &message, &signature).await;
            // The receiver is gone once another key has succeeded.
            let _ = tx.send((key, outcome)).await;
        });
    }
    drop(tx);

    while let Some((key, outcome)) = rx.recv().await {
        match outcome {
            Ok(()) => {
                debug!(key = %key.display(), file = %file.display(), "signature verified");
                return Ok(Authenticity::Authentic);
            }
            Err(err) => debug!(key = %key.display(), %err, "key did not verify signature"),
        }
    }

    warn!(file = %file.display(), keys = keys.len(), "no trusted key verified the signature");
    Ok(Authenticity::Corrupted)
}

async fn verify_with_keyring(
    key_file: &Path,
    message: &[u8],
    signature: &Signature,
) -> std::result::Result<(), KeyringError> {
    let text = tokio::fs::read_to_string(key_file).await?;
    let keyring = parse_keyring(&text)?;

    if keyring
        .iter()
        .any(|key| key.verify(message, signature).is_ok())
    {
        Ok(())
    } else {
        Err(KeyringError::NoMatch)
    }
}

fn parse_keyring(text: &str) -> std::result::Result<Vec<VerifyingKey>, KeyringError> {
    let mut keys = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let key = parse_public_key(line).map_err(|reason| KeyringError::Malformed {
            line: index + 1,
            reason,
        })?;
        keys.push(key);
    }

    if keys.is_empty() {
        return Err(KeyringError::Empty);
    }
    Ok(keys)
}

fn parse_public_key(raw: &str) -> std::result::Result<VerifyingKey, String> {
    let bytes = decode_hex_or_base64(raw)?;
    let key_bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "Ed25519 public key must decode to 32 bytes".to_string())?;
    VerifyingKey::from_bytes(&key_bytes).map_err(|e| format!("invalid Ed25519 public key: {e}"))
}

fn parse_signature(raw: &[u8]) -> std::result::Result<Signature, String> {
    if let Ok(bytes) = <[u8; 64]>::try_from(raw) {
        return Ok(Signature::from_bytes(&bytes));
    }

    let text = std::str::from_utf8(raw)
        .map_err(|_| "signature must be UTF-8 text or 64 raw bytes".to_string())?;
    let bytes: [u8; 64] = decode_hex_or_base64(text)?
        .try_into()
        .map_err(|_| "Ed25519 signature must decode to 64 bytes".to_string())?;
    Ok(Signature::from_bytes(&bytes))
}

fn decode_hex_or_base64(raw: &str) -> std::result::Result<Vec<u8>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("value is empty".to_string());
    }
    if trimmed.len() % 2 == 0 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(trimmed).map_err(|e| format!("invalid hex: {e}"));
    }
    general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| format!("value is neither hex nor base64: {e}"))
}
