//! Integrity checksums for database backup files.
//!
//! SHA-256 digests (plus legacy MD5 for sidecars written by older releases)
//! detect corruption before a backup is trusted for restore. Each backup may
//! carry a `<file>.checksum` sidecar holding its hex digest.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const CHECKSUM_EXTENSION: &str = "checksum";

/// Hex SHA-256 digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex MD5 digest. Legacy only: accepted when verifying old sidecars, never
/// written for new ones.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Compare data against an expected hex digest, case-insensitively.
///
/// Accepts a SHA-256 digest, or an MD5 digest for legacy sidecars.
pub fn verify_digest(data: &[u8], expected_hex: &str) -> bool {
    let expected = expected_hex.to_ascii_lowercase();
    match expected.len() {
        64 => sha256_hex(data) == expected,
        32 => md5_hex(data) == expected,
        _ => false,
    }
}

/// Outcome of a backup integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityStatus {
    /// Digest matches the sidecar
    Match,
    /// Sidecar present but digest differs
    Mismatch,
    /// No sidecar metadata available for this file
    NoMetadata,
}

/// Structured result of [`verify_backup_integrity`].
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub status: IntegrityStatus,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub message: String,
}

impl IntegrityReport {
    pub fn is_success(&self) -> bool {
        self.status == IntegrityStatus::Match
    }
}

fn sidecar_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_os_string();
    name.push(".");
    name.push(CHECKSUM_EXTENSION);
    PathBuf::from(name)
}

/// Write the `<file>.checksum` sidecar for a backup file.
pub fn save_checksum_metadata(file: &Path) -> std::io::Result<String> {
    let data = fs::read(file)?;
    let digest = sha256_hex(&data);
    fs::write(sidecar_path(file), &digest)?;
    info!("Wrote checksum sidecar for {}", file.display());
    Ok(digest)
}

/// Check a backup file against its sidecar.
///
/// Distinguishes "no metadata available" from "checksum mismatch" from
/// "match"; an unreadable backup file surfaces as an IO error.
pub fn verify_backup_integrity(file: &Path) -> std::io::Result<IntegrityReport> {
    let data = fs::read(file)?;
    let actual = sha256_hex(&data);

    let sidecar = sidecar_path(file);
    if !sidecar.exists() {
        return Ok(IntegrityReport {
            status: IntegrityStatus::NoMetadata,
            expected: None,
            actual: Some(actual),
            message: "No checksum metadata available for this backup".to_string(),
        });
    }

    let expected = fs::read_to_string(&sidecar)?.trim().to_ascii_lowercase();
    if verify_digest(&data, &expected) {
        Ok(IntegrityReport {
            status: IntegrityStatus::Match,
            expected: Some(expected),
            actual: Some(actual),
            message: "Backup checksum verified".to_string(),
        })
    } else {
        Ok(IntegrityReport {
            status: IntegrityStatus::Mismatch,
            expected: Some(expected),
            actual: Some(actual),
            message: "Backup checksum mismatch - file may be corrupted".to_string(),
        })
    }
}
