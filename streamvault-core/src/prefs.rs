//! Durable preference storage for key-lifecycle settings.
//!
//! A small JSON file in the platform config directory holding the wrapped
//! key material, the versioned KDF parameters, the key fingerprint, and the
//! lock-policy toggles. These values must be readable while the database
//! itself is locked, absent, or mid-migration, so they live outside it.
//!
//! Writes go through a temp-file-and-rename so a crash never leaves a
//! half-written preference file.

use crate::crypto::enclave::WrappedKeyMaterial;
use crate::crypto::kdf::KdfParams;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const PREFS_FILE: &str = "keystore.json";

/// Errors from the preference store
#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Corrupt preference value: {0}")]
    Corrupt(String),

    #[error("Preference store lock poisoned")]
    LockPoisoned,
}

/// Result type for preference operations
pub type Result<T> = std::result::Result<T, PrefsError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PrefData {
    /// Base64 AES-256-GCM ciphertext of the wrapped database key
    encrypted_database_key: Option<String>,

    /// Base64 12-byte GCM nonce used for the wrap
    encryption_key_iv: Option<String>,

    /// Versioned KDF parameters (algorithm id, iterations, salt)
    encryption_kdf_params: Option<KdfParams>,

    /// Whether PIN-based database encryption is enrolled
    #[serde(default)]
    pin_encryption_enabled: bool,

    /// Hex HMAC-SHA256 fingerprint of the enrolled key
    usb_encryption_key_fingerprint: Option<String>,

    /// Epoch millis of the last successful fingerprint verification
    usb_encryption_last_verified: Option<i64>,

    /// Auto-lock on credential removal / session timeout (default true)
    usb_encryption_auto_lock: Option<bool>,
}

/// Mutex-guarded, file-backed preference store.
pub struct PrefStore {
    path: PathBuf,
    data: Mutex<PrefData>,
}

impl PrefStore {
    /// Open (or create) the preference store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            PrefData::default()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Open the store at the default platform config location.
    pub fn at_default_location() -> Result<Self> {
        let dir = crate::platform::get_config_dir();
        fs::create_dir_all(&dir)?;
        Self::open(dir.join(PREFS_FILE))
    }

    fn read<T>(&self, f: impl FnOnce(&PrefData) -> T) -> Result<T> {
        let guard = self.data.lock().map_err(|_| PrefsError::LockPoisoned)?;
        Ok(f(&guard))
    }

    fn mutate(&self, f: impl FnOnce(&mut PrefData)) -> Result<()> {
        let mut guard = self.data.lock().map_err(|_| PrefsError::LockPoisoned)?;
        f(&mut guard);
        self.persist(&guard)
    }

    /// Atomic write: serialize to a sibling temp file, then rename over the
    /// target path.
    fn persist(&self, data: &PrefData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    // ── Wrapped key material ────────────────────────────────────────────

    /// Persist the wrapped key material and the KDF parameters that produced
    /// the key it wraps. Overwrites any prior enrollment.
    pub fn set_enrollment(&self, wrapped: &WrappedKeyMaterial, params: &KdfParams) -> Result<()> {
        self.mutate(|d| {
            d.encrypted_database_key = Some(BASE64.encode(&wrapped.ciphertext));
            d.encryption_key_iv = Some(BASE64.encode(wrapped.nonce));
            d.encryption_kdf_params = Some(params.clone());
            d.pin_encryption_enabled = true;
        })
    }

    /// Load the wrapped key material, if enrolled.
    pub fn wrapped_key(&self) -> Result<Option<WrappedKeyMaterial>> {
        let (ct, iv) = self.read(|d| {
            (
                d.encrypted_database_key.clone(),
                d.encryption_key_iv.clone(),
            )
        })?;

        let (ct, iv) = match (ct, iv) {
            (Some(ct), Some(iv)) => (ct, iv),
            _ => return Ok(None),
        };

        let ciphertext = BASE64
            .decode(ct)
            .map_err(|e| PrefsError::Corrupt(format!("encrypted_database_key: {e}")))?;
        let iv_bytes = BASE64
            .decode(iv)
            .map_err(|e| PrefsError::Corrupt(format!("encryption_key_iv: {e}")))?;
        let nonce: [u8; 12] = iv_bytes
            .try_into()
            .map_err(|_| PrefsError::Corrupt("encryption_key_iv: wrong length".to_string()))?;

        Ok(Some(WrappedKeyMaterial { ciphertext, nonce }))
    }

    /// Load the stored KDF parameters, if enrolled.
    pub fn kdf_params(&self) -> Result<Option<KdfParams>> {
        self.read(|d| d.encryption_kdf_params.clone())
    }

    /// Remove all enrollment material (wrapped key, params, enabled flag).
    pub fn clear_enrollment(&self) -> Result<()> {
        self.mutate(|d| {
            d.encrypted_database_key = None;
            d.encryption_key_iv = None;
            d.encryption_kdf_params = None;
            d.pin_encryption_enabled = false;
        })
    }

    pub fn pin_encryption_enabled(&self) -> Result<bool> {
        self.read(|d| d.pin_encryption_enabled)
    }

    // ── Fingerprint ─────────────────────────────────────────────────────

    pub fn set_fingerprint(&self, fingerprint_hex: &str, verified_at_millis: i64) -> Result<()> {
        self.mutate(|d| {
            d.usb_encryption_key_fingerprint = Some(fingerprint_hex.to_string());
            d.usb_encryption_last_verified = Some(verified_at_millis);
        })
    }

    pub fn fingerprint(&self) -> Result<Option<String>> {
        self.read(|d| d.usb_encryption_key_fingerprint.clone())
    }

    pub fn set_last_verified(&self, verified_at_millis: i64) -> Result<()> {
        self.mutate(|d| d.usb_encryption_last_verified = Some(verified_at_millis))
    }

    pub fn last_verified(&self) -> Result<Option<i64>> {
        self.read(|d| d.usb_encryption_last_verified)
    }

    pub fn clear_fingerprint(&self) -> Result<()> {
        self.mutate(|d| {
            d.usb_encryption_key_fingerprint = None;
            d.usb_encryption_last_verified = None;
        })
    }

    // ── Lock policy ─────────────────────────────────────────────────────

    /// Auto-lock on credential removal / timeout. Defaults to true when
    /// never explicitly set.
    pub fn auto_lock_enabled(&self) -> Result<bool> {
        self.read(|d| d.usb_encryption_auto_lock.unwrap_or(true))
    }

    pub fn set_auto_lock_enabled(&self, enabled: bool) -> Result<()> {
        self.mutate(|d| d.usb_encryption_auto_lock = Some(enabled))
    }
}
