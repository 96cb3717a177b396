//! Filesystem fixtures for partition images.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// Create a scratch directory removed when the handle drops.
///
/// # Errors
///
/// Returns an error if the temporary directory cannot be created.
pub fn temp_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("otaverify-")
        .tempdir()
        .context("failed to create temporary directory")
}

/// Write `contents` to `dir/name` and return the full path.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_image(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Deterministic image contents of `len` bytes seeded by `seed`.
#[must_use]
pub fn image_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|index| {
            let low = u8::try_from(index % 251).unwrap_or(0);
            low.wrapping_mul(31).wrapping_add(seed)
        })
        .collect()
}

/// SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}
