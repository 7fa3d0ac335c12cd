//! PBKDF2-HMAC-SHA256 key derivation for PIN processing.
//!
//! Turns a 6-digit PIN plus a 32-byte random salt into a 256-bit database
//! key. The algorithm identifier and iteration count are persisted alongside
//! the salt so the scheme can be upgraded later without breaking existing
//! enrollments; the current scheme is version 1.

use crate::crypto::{CryptoError, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Required PIN length, in ASCII digits.
pub const PIN_LENGTH: usize = 6;

/// Salt length for PIN derivation.
pub const SALT_LENGTH: usize = 32;

/// PBKDF2 iteration count for scheme version 1.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Versioned derivation algorithm identifier.
///
/// Stored with the salt so that a future scheme (higher iteration count,
/// different KDF) can coexist with version-1 enrollments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KdfAlgorithm {
    Pbkdf2HmacSha256V1,
}

/// Parameters for PIN key derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Algorithm identifier (scheme version)
    pub algorithm: KdfAlgorithm,

    /// Iteration count
    pub iterations: u32,

    /// Salt for key derivation (32 bytes, unique per enrollment)
    pub salt: [u8; SALT_LENGTH],
}

impl KdfParams {
    /// Create version-1 parameters with a fresh random salt.
    ///
    /// Each enrollment must call this; salts are never reused across
    /// re-enrollments.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self {
            algorithm: KdfAlgorithm::Pbkdf2HmacSha256V1,
            iterations: PBKDF2_ITERATIONS,
            salt,
        }
    }

    /// Verify that parameters are within acceptable ranges.
    pub fn validate(&self) -> Result<()> {
        if self.iterations < 10_000 {
            return Err(CryptoError::KdfFailed(
                "Iteration count too low (minimum: 10,000)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check whether a PIN is exactly six ASCII digits.
///
/// Reports invalid input without throwing; callers use this for early UI
/// validation before paying the derivation cost.
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit())
}

/// Derive a 256-bit key from a PIN using PBKDF2-HMAC-SHA256.
///
/// Deterministic: the same (pin, salt) pair always yields the same key, so
/// re-entering the correct PIN reproduces the enrollment key.
///
/// # Errors
/// `InvalidPinFormat` if the PIN is not exactly 6 ASCII digits.
pub fn derive_key(pin: &str, params: &KdfParams) -> Result<[u8; 32]> {
    if !is_valid_pin(pin) {
        return Err(CryptoError::InvalidPinFormat);
    }
    params.validate()?;

    let mut key = [0u8; 32];
    match params.algorithm {
        KdfAlgorithm::Pbkdf2HmacSha256V1 => {
            pbkdf2::pbkdf2_hmac::<Sha256>(pin.as_bytes(), &params.salt, params.iterations, &mut key);
        }
    }

    Ok(key)
}
