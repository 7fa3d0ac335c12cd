//! StreamVault Key-Lifecycle Core
//!
//! This library owns the encrypted-database key lifecycle for the StreamVault
//! media library: PIN-based key derivation, master-key wrapping, key
//! fingerprint verification, the in-memory session unlock state, lock
//! coordination, and the plaintext ⇄ SQLCipher database migration.
//!
//! Everything else in the application (playlist handling, playback, UI) is an
//! external collaborator whose only contract with this crate is
//! [`LockCoordinator::encryption_key_if_unlocked`] plus the lock/unlock entry
//! points.

pub mod checksum;
pub mod crypto;
pub mod lock;
pub mod migration;
pub mod platform;
pub mod prefs;
pub mod session;

pub use crypto::{
    enclave::{EphemeralEnclave, MasterKeyHandle, OsKeychainEnclave, SecureEnclave, WrappedKeyMaterial},
    fingerprint::{fingerprint, FingerprintVerifier},
    kdf::{derive_key, is_valid_pin, KdfAlgorithm, KdfParams},
    CryptoError,
};
pub use checksum::{md5_hex, sha256_hex, verify_digest, IntegrityReport, IntegrityStatus};
pub use lock::{DatabaseHandle, LockCoordinator, LockError};
pub use migration::{DatabaseCryptoMigrator, MigrationError, MigrationStage};
pub use platform::{default_database_path, get_config_dir, get_data_dir};
pub use prefs::{PrefStore, PrefsError};
pub use session::SessionGuard;

use thiserror::Error;

/// Result type for StreamVault core operations
pub type Result<T> = std::result::Result<T, StreamVaultError>;

/// General error type for the key-lifecycle core
#[derive(Error, Debug)]
pub enum StreamVaultError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Preference store error: {0}")]
    Prefs(#[from] PrefsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
