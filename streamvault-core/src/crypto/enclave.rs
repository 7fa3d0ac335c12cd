//! Master-key wrapping under a secure-enclave abstraction.
//!
//! The PIN-derived database key is never persisted in plaintext. It is
//! wrapped with AES-256-GCM under a master key that the application never
//! stores itself: [`OsKeychainEnclave`] parks the master key in the OS key
//! storage under a well-known alias, and hands out a [`MasterKeyHandle`]
//! that can encrypt and decrypt but is zeroized on drop.
//!
//! The caller persists the resulting (ciphertext, nonce) pair plus the KDF
//! parameters in the preference store; this module persists nothing.

use crate::crypto::zero::SecureBuffer;
use crate::crypto::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use std::sync::Mutex;
use zeroize::{Zeroize, ZeroizeOnDrop};

const KEYCHAIN_SERVICE: &str = "tv.streamvault.core";
const KEYCHAIN_ALIAS: &str = "database_master_key";

/// A derived key encrypted under the enclave master key.
///
/// Safe to persist. The nonce is generated fresh by the cipher for every
/// wrap call and is never reused.
#[derive(Debug, Clone)]
pub struct WrappedKeyMaterial {
    /// AES-256-GCM ciphertext (includes the 16-byte authentication tag)
    pub ciphertext: Vec<u8>,

    /// 12-byte GCM nonce
    pub nonce: [u8; 12],
}

/// Handle to the enclave master key.
///
/// Can wrap and unwrap 32-byte keys but never exposes its own raw bytes.
/// Zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct MasterKeyHandle {
    key: [u8; 32],
}

impl std::fmt::Debug for MasterKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKeyHandle")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl MasterKeyHandle {
    fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Encrypt a 32-byte key under the master key with AES-256-GCM.
    ///
    /// The nonce is generated fresh per call by the cipher provider.
    pub fn wrap(&self, plaintext: &[u8; 32]) -> Result<WrappedKeyMaterial> {
        let cipher = Aes256Gcm::new((&self.key).into());
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let nonce_bytes: [u8; 12] = nonce.into();

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|e| CryptoError::WrapFailed(e.to_string()))?;

        Ok(WrappedKeyMaterial {
            ciphertext,
            nonce: nonce_bytes,
        })
    }

    /// Decrypt previously wrapped key material.
    ///
    /// # Errors
    /// `UnwrapFailed` if the GCM tag does not verify (corrupted or tampered
    /// material, or a different master key).
    pub fn unwrap(&self, wrapped: &WrappedKeyMaterial) -> Result<[u8; 32]> {
        let cipher = Aes256Gcm::new((&self.key).into());
        let nonce = Nonce::from(wrapped.nonce);

        let plaintext = SecureBuffer::new(
            cipher
                .decrypt(&nonce, wrapped.ciphertext.as_ref())
                .map_err(|_| CryptoError::UnwrapFailed)?,
        );

        if plaintext.len() != 32 {
            return Err(CryptoError::UnwrapFailed);
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(plaintext.as_bytes());
        Ok(key)
    }
}

/// Abstraction over the hardware-backed key storage.
///
/// The master key has no user-authentication requirement of its own; the PIN
/// is the authentication factor, the enclave only keeps the wrapping key out
/// of application storage.
pub trait SecureEnclave: Send + Sync {
    /// Idempotent: returns the existing master key, generating and parking a
    /// new AES-256 key under the well-known alias if absent.
    fn get_or_create_master_key(&self) -> Result<MasterKeyHandle>;

    /// Remove the master key. Used when encryption is disabled. Removing an
    /// absent key is a no-op success.
    fn delete_master_key(&self) -> Result<()>;
}

/// Master key held by the OS keychain (Secret Service / Keychain /
/// Credential Manager).
pub struct OsKeychainEnclave {
    service: String,
    alias: String,
}

impl OsKeychainEnclave {
    pub fn new() -> Self {
        Self {
            service: KEYCHAIN_SERVICE.to_string(),
            alias: KEYCHAIN_ALIAS.to_string(),
        }
    }

    /// Use a non-default service name, e.g. to isolate test profiles.
    pub fn with_service(service: &str, alias: &str) -> Self {
        Self {
            service: service.to_string(),
            alias: alias.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.alias)
            .map_err(|e| CryptoError::EnclaveUnavailable(e.to_string()))
    }
}

impl Default for OsKeychainEnclave {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureEnclave for OsKeychainEnclave {
    fn get_or_create_master_key(&self) -> Result<MasterKeyHandle> {
        let entry = self.entry()?;

        match entry.get_password() {
            Ok(mut hex_string) => {
                let decoded = hex::decode(&hex_string);
                hex_string.zeroize();

                let bytes = SecureBuffer::new(decoded.map_err(|_| {
                    CryptoError::EnclaveUnavailable("malformed master key in keychain".to_string())
                })?);
                if bytes.len() != 32 {
                    return Err(CryptoError::EnclaveUnavailable(
                        "malformed master key in keychain".to_string(),
                    ));
                }

                let mut key = [0u8; 32];
                key.copy_from_slice(bytes.as_bytes());
                Ok(MasterKeyHandle::from_bytes(key))
            }
            Err(keyring::Error::NoEntry) => {
                let mut key = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut key);

                let mut hex_string = hex::encode(key);
                let stored = entry.set_password(&hex_string);
                hex_string.zeroize();
                stored.map_err(|e| CryptoError::EnclaveUnavailable(e.to_string()))?;

                Ok(MasterKeyHandle::from_bytes(key))
            }
            Err(e) => Err(CryptoError::EnclaveUnavailable(e.to_string())),
        }
    }

    fn delete_master_key(&self) -> Result<()> {
        let entry = self.entry()?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CryptoError::EnclaveUnavailable(e.to_string())),
        }
    }
}

/// In-memory enclave for tests and headless environments without an OS
/// keychain. The master key lives only for the life of the process.
#[derive(Default)]
pub struct EphemeralEnclave {
    key: Mutex<Option<[u8; 32]>>,
}

impl EphemeralEnclave {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureEnclave for EphemeralEnclave {
    fn get_or_create_master_key(&self) -> Result<MasterKeyHandle> {
        let mut guard = self
            .key
            .lock()
            .map_err(|_| CryptoError::EnclaveUnavailable("poisoned enclave lock".to_string()))?;

        let key = match *guard {
            Some(key) => key,
            None => {
                let mut key = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut key);
                *guard = Some(key);
                key
            }
        };

        Ok(MasterKeyHandle::from_bytes(key))
    }

    fn delete_master_key(&self) -> Result<()> {
        let mut guard = self
            .key
            .lock()
            .map_err(|_| CryptoError::EnclaveUnavailable("poisoned enclave lock".to_string()))?;
        if let Some(ref mut key) = *guard {
            key.zeroize();
        }
        *guard = None;
        Ok(())
    }
}
