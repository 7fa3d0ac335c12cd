//! Key fingerprint computation and verification.
//!
//! A fingerprint is the hex HMAC-SHA256 of a key under a fixed application
//! salt constant. It confirms "this is the right key" without ever storing
//! the key in comparable plaintext form: one-way, deterministic, and
//! compared in constant time.

use crate::prefs::PrefStore;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Fixed application salt used as the HMAC key. Versioned so a future scheme
/// can re-fingerprint without ambiguity.
const FINGERPRINT_SALT: &[u8] = b"streamvault-key-fingerprint-v1";

/// Compute the hex HMAC-SHA256 fingerprint of a key.
pub fn fingerprint(key: &[u8]) -> String {
    hex::encode(fingerprint_raw(key))
}

fn fingerprint_raw(key: &[u8]) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(FINGERPRINT_SALT).expect("HMAC accepts any key length");
    mac.update(key);
    mac.finalize().into_bytes().into()
}

/// Persists and checks key fingerprints against the preference store.
pub struct FingerprintVerifier {
    prefs: Arc<PrefStore>,
}

impl FingerprintVerifier {
    pub fn new(prefs: Arc<PrefStore>) -> Self {
        Self { prefs }
    }

    /// Persist a fingerprint together with a fresh "last verified" timestamp.
    pub fn store(&self, fingerprint_hex: &str) -> crate::prefs::Result<()> {
        self.prefs
            .set_fingerprint(fingerprint_hex, chrono::Utc::now().timestamp_millis())
    }

    /// Recompute the candidate key's fingerprint and compare it against the
    /// stored value in constant time.
    ///
    /// Absence of a stored fingerprint is not an error: the result is simply
    /// `false` and the caller routes the user to enrollment instead of
    /// unlock. On a match the "last verified" timestamp is refreshed.
    pub fn verify(&self, candidate_key: &[u8]) -> bool {
        let stored_hex = match self.prefs.fingerprint() {
            Ok(Some(hex)) => hex,
            Ok(None) => return false,
            Err(e) => {
                warn!("Failed to load stored fingerprint: {e}");
                return false;
            }
        };

        let stored: [u8; 32] = match hex::decode(&stored_hex) {
            Ok(bytes) => match bytes.try_into() {
                Ok(arr) => arr,
                Err(_) => {
                    warn!("Stored fingerprint has unexpected length");
                    return false;
                }
            },
            Err(_) => {
                warn!("Stored fingerprint is not valid hex");
                return false;
            }
        };

        let candidate = fingerprint_raw(candidate_key);
        let matches: bool = candidate.ct_eq(&stored).into();

        if matches {
            if let Err(e) = self
                .prefs
                .set_last_verified(chrono::Utc::now().timestamp_millis())
            {
                warn!("Failed to refresh last-verified timestamp: {e}");
            }
        }
        matches
    }

    /// Timestamp of the last successful verification, if any.
    pub fn last_verified(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.prefs
            .last_verified()
            .ok()
            .flatten()
            .and_then(chrono::DateTime::from_timestamp_millis)
    }

    /// Erase the stored fingerprint and timestamp (disabling encryption).
    pub fn clear(&self) -> crate::prefs::Result<()> {
        self.prefs.clear_fingerprint()
    }
}
