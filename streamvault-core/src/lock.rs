//! Lock coordination - serializes every path that can lock or unlock the
//! application.
//!
//! All lock triggers (explicit user request, removal of the external
//! credential source, session timeout) funnel into one
//! [`LockCoordinator::lock_application`] operation that closes the database
//! handle, zeroes the cached key, and flips the session to Locked. Unlock
//! goes through fingerprint verification and only flips state on success.
//!
//! The coordinator is an explicit service struct constructed once at startup
//! and passed by reference to consumers; there are no ambient globals.

use crate::crypto::enclave::SecureEnclave;
use crate::crypto::fingerprint::{fingerprint, FingerprintVerifier};
use crate::crypto::kdf::{derive_key, KdfParams};
use crate::crypto::zero::zeroize_bytes;
use crate::crypto::CryptoError;
use crate::prefs::{PrefStore, PrefsError};
use crate::session::SessionGuard;
use std::sync::{Arc, Mutex};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from lock/unlock coordination
#[derive(Error, Debug)]
pub enum LockError {
    /// The supplied credential did not verify against the stored
    /// fingerprint. Deliberately does not distinguish a wrong PIN from
    /// corrupted key material.
    #[error("Key verification failed")]
    KeyVerificationFailed,

    /// No enrollment exists; the caller must route the user to enrollment
    /// instead of unlock.
    #[error("No PIN enrollment found")]
    NotEnrolled,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Preference store error: {0}")]
    Prefs(#[from] PrefsError),
}

/// Result type for lock operations
pub type Result<T> = std::result::Result<T, LockError>;

/// An open database connection the coordinator can close on lock.
///
/// This is the only thing the excluded persistence layer hands to this
/// crate; closing must not panic.
pub trait DatabaseHandle: Send {
    fn close(self: Box<Self>);
}

/// Coordinates enrollment, unlock, and every forced-lock path.
pub struct LockCoordinator {
    session: Arc<SessionGuard>,
    prefs: Arc<PrefStore>,
    verifier: FingerprintVerifier,
    enclave: Arc<dyn SecureEnclave>,
    db_handle: Mutex<Option<Box<dyn DatabaseHandle>>>,
}

impl LockCoordinator {
    pub fn new(prefs: Arc<PrefStore>, enclave: Arc<dyn SecureEnclave>) -> Self {
        let verifier = FingerprintVerifier::new(Arc::clone(&prefs));
        Self {
            session: Arc::new(SessionGuard::new()),
            prefs,
            verifier,
            enclave,
            db_handle: Mutex::new(None),
        }
    }

    /// Shared session handle for collaborators that only need key access.
    pub fn session(&self) -> Arc<SessionGuard> {
        Arc::clone(&self.session)
    }

    /// `Some(key)` while unlocked; `None` must make the caller show an
    /// unlock prompt instead of opening the database.
    pub fn encryption_key_if_unlocked(&self) -> Option<[u8; 32]> {
        self.session.encryption_key_if_unlocked()
    }

    pub fn is_pin_enrolled(&self) -> Result<bool> {
        Ok(self.prefs.pin_encryption_enabled()?)
    }

    /// Enroll a PIN: fresh salt, PBKDF2 derivation, wrap under the enclave
    /// master key, persist the wrapped material + params + fingerprint, and
    /// leave the session Unlocked.
    ///
    /// Returns the derived key so the caller can immediately run the
    /// database encryption migration. Re-enrolling overwrites the previous
    /// material with a regenerated salt.
    pub fn enroll_pin(&self, pin: &str) -> Result<[u8; 32]> {
        let params = KdfParams::generate();
        let key = derive_key(pin, &params)?;

        let master = self.enclave.get_or_create_master_key()?;
        let wrapped = master.wrap(&key)?;

        // Unwrap what was just wrapped and compare before persisting, so a
        // broken enclave surfaces at enrollment rather than at first unlock.
        let mut check = master.unwrap(&wrapped)?;
        let ok: bool = check.ct_eq(&key).into();
        zeroize_bytes(&mut check);
        if !ok {
            return Err(LockError::Crypto(CryptoError::WrapFailed(
                "enclave wrap/unwrap mismatch".to_string(),
            )));
        }

        self.prefs.set_enrollment(&wrapped, &params)?;
        self.verifier.store(&fingerprint(&key))?;
        self.session.unlock(key);

        info!("PIN enrollment complete");
        Ok(key)
    }

    /// Unlock with a PIN: re-derive with the stored parameters and verify
    /// the fingerprint. Flips state only on success; a failed attempt leaves
    /// the session exactly as it was.
    pub fn unlock_application(&self, pin: &str) -> Result<()> {
        let params = self.prefs.kdf_params()?.ok_or(LockError::NotEnrolled)?;
        let mut key = derive_key(pin, &params)?;

        if self.verifier.verify(&key) {
            self.session.unlock(key);
            Ok(())
        } else {
            zeroize_bytes(&mut key);
            Err(LockError::KeyVerificationFailed)
        }
    }

    /// Unlock with an externally-derived key (removable credential path).
    /// Same fingerprint verification, same single failure mode.
    pub fn unlock_with_key(&self, key: &[u8]) -> Result<()> {
        let key: [u8; 32] = key.try_into().map_err(|_| {
            LockError::Crypto(CryptoError::InvalidKeySize {
                expected: 32,
                got: key.len(),
            })
        })?;

        if self.verifier.verify(&key) {
            self.session.unlock(key);
            Ok(())
        } else {
            Err(LockError::KeyVerificationFailed)
        }
    }

    /// Register the open database connection so a forced lock can close it.
    pub fn register_database_handle(&self, handle: Box<dyn DatabaseHandle>) {
        match self.db_handle.lock() {
            Ok(mut guard) => *guard = Some(handle),
            Err(poisoned) => *poisoned.into_inner() = Some(handle),
        }
    }

    /// Force the application to Locked: close the database handle if one is
    /// open, zero and clear the cached session key. Idempotent; locking an
    /// already-locked application is a no-op success and this never fails.
    pub fn lock_application(&self, reason: &str) {
        info!("Locking application: {reason}");

        let handle = match self.db_handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.close();
        }

        self.session.lock();
    }

    /// External signal: the removable credential source disappeared.
    /// Ignored when the auto-lock policy is disabled.
    pub fn credential_removed(&self) {
        match self.prefs.auto_lock_enabled() {
            Ok(true) => self.lock_application("credential removed"),
            Ok(false) => info!("Credential removed but auto-lock is disabled"),
            Err(e) => {
                // Fail closed: an unreadable policy locks.
                warn!("Could not read auto-lock policy ({e}); locking");
                self.lock_application("credential removed");
            }
        }
    }

    /// External signal: the session timed out. Subject to the same auto-lock
    /// policy as credential removal.
    pub fn session_timed_out(&self) {
        match self.prefs.auto_lock_enabled() {
            Ok(true) => self.lock_application("session timeout"),
            Ok(false) => info!("Session timeout but auto-lock is disabled"),
            Err(e) => {
                warn!("Could not read auto-lock policy ({e}); locking");
                self.lock_application("session timeout");
            }
        }
    }

    pub fn auto_lock_enabled(&self) -> Result<bool> {
        Ok(self.prefs.auto_lock_enabled()?)
    }

    pub fn set_auto_lock_enabled(&self, enabled: bool) -> Result<()> {
        Ok(self.prefs.set_auto_lock_enabled(enabled)?)
    }

    /// Tear down encryption: lock, erase the wrapped key material and
    /// fingerprint, and delete the enclave master key.
    pub fn disable_encryption(&self) -> Result<()> {
        self.lock_application("encryption disabled");
        self.prefs.clear_enrollment()?;
        self.verifier.clear()?;
        self.enclave.delete_master_key()?;
        info!("Encryption disabled; enrollment material cleared");
        Ok(())
    }
}
