//! Cryptographic primitives for the key-lifecycle core.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation from a user PIN
//! - AES-256-GCM wrapping of the derived key under an enclave master key
//! - HMAC-SHA256 key fingerprinting and verification
//! - Zeroization utilities

pub mod enclave;
pub mod fingerprint;
pub mod kdf;
pub mod zero;

pub use enclave::{MasterKeyHandle, SecureEnclave, WrappedKeyMaterial};
pub use fingerprint::{fingerprint, FingerprintVerifier};
pub use kdf::{derive_key, is_valid_pin, KdfParams};
pub use zero::{zeroize_bytes, SecureBuffer};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("PIN must be exactly 6 ASCII digits")]
    InvalidPinFormat,

    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeySize { expected: usize, got: usize },

    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Wrapping key material failed: {0}")]
    WrapFailed(String),

    #[error("Unwrapping key material failed - tag mismatch or corrupted data")]
    UnwrapFailed,

    #[error("Secure enclave unavailable: {0}")]
    EnclaveUnavailable(String),

    #[error("Random number generation failed: {0}")]
    RandomFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
