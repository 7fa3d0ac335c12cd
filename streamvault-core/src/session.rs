//! In-memory session unlock state.
//!
//! The session is the only place the raw 256-bit database key exists outside
//! of a derivation or unwrap call. It lives strictly in process memory,
//! starts Locked, and the cached key bytes are overwritten with zeros before
//! the Unlocked state is discarded — dropping the reference alone is not
//! enough.
//!
//! State machine: `Locked --unlock--> Unlocked --lock--> Locked`. Unlocking
//! while already Unlocked is idempotent (refreshes the timestamp and key).

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroize;

/// The cached database key. Heap-allocated so the wipe hits the only copy,
/// zeroized both explicitly on lock and defensively on drop.
struct CachedKey {
    bytes: Box<[u8; 32]>,
}

impl CachedKey {
    fn new(bytes: [u8; 32]) -> Self {
        Self {
            bytes: Box::new(bytes),
        }
    }

    fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for CachedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

enum SessionState {
    Locked,
    Unlocked {
        since: DateTime<Utc>,
        key: CachedKey,
    },
}

/// Mutex-guarded session state, shared between the unlock/lock paths and any
/// thread that needs the key to open the database.
pub struct SessionGuard {
    state: Mutex<SessionState>,
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionGuard {
    /// A new session starts Locked.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Locked),
        }
    }

    /// Transition to Unlocked, caching `key`. Only called after the key has
    /// been fingerprint-verified. Re-unlocking refreshes the timestamp.
    pub fn unlock(&self, key: [u8; 32]) {
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Session lock poisoned; recovering");
                poisoned.into_inner()
            }
        };

        if let SessionState::Unlocked { key: old, .. } = &mut *guard {
            old.wipe();
        }
        *guard = SessionState::Unlocked {
            since: Utc::now(),
            key: CachedKey::new(key),
        };
        info!("Session unlocked");
    }

    /// Transition to Locked, zeroing the cached key bytes in place before
    /// the state is discarded. Locking an already-locked session is a no-op.
    pub fn lock(&self) {
        self.lock_internal();
    }

    /// Shared lock path; returns a copy of the cached key bytes taken after
    /// the wipe, so tests can observe that the underlying storage really was
    /// zeroed.
    fn lock_internal(&self) -> Option<[u8; 32]> {
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Session lock poisoned; recovering");
                poisoned.into_inner()
            }
        };

        match &mut *guard {
            SessionState::Locked => None,
            SessionState::Unlocked { key, .. } => {
                key.wipe();
                let witness = *key.bytes;
                *guard = SessionState::Locked;
                info!("Session locked");
                Some(witness)
            }
        }
    }

    /// The sole interface boundary the database-opening collaborator depends
    /// on: `Some(key)` while Unlocked, `None` while Locked. A `None` means
    /// the caller must present an unlock prompt rather than open the
    /// database.
    pub fn encryption_key_if_unlocked(&self) -> Option<[u8; 32]> {
        let guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };

        match &*guard {
            SessionState::Locked => None,
            SessionState::Unlocked { key, .. } => Some(*key.bytes),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        let guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        matches!(&*guard, SessionState::Unlocked { .. })
    }

    /// When the current unlock happened, if Unlocked.
    pub fn unlocked_since(&self) -> Option<DateTime<Utc>> {
        let guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match &*guard {
            SessionState::Locked => None,
            SessionState::Unlocked { since, .. } => Some(*since),
        }
    }

    /// Test hook: lock and return the post-wipe contents of the key buffer.
    #[cfg(test)]
    pub(crate) fn lock_and_witness_wipe(&self) -> Option<[u8; 32]> {
        self.lock_internal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_locked() {
        let session = SessionGuard::new();
        assert!(!session.is_unlocked());
        assert!(session.encryption_key_if_unlocked().is_none());
        assert!(session.unlocked_since().is_none());
    }

    #[test]
    fn test_unlock_caches_key() {
        let session = SessionGuard::new();
        let key = [0x5au8; 32];

        session.unlock(key);
        assert!(session.is_unlocked());
        assert_eq!(session.encryption_key_if_unlocked(), Some(key));
        assert!(session.unlocked_since().is_some());
    }

    #[test]
    fn test_lock_clears_and_zeroes_key() {
        let session = SessionGuard::new();
        session.unlock([0xffu8; 32]);

        let wiped = session.lock_and_witness_wipe().unwrap();
        assert_eq!(wiped, [0u8; 32]);
        assert!(!session.is_unlocked());
        assert!(session.encryption_key_if_unlocked().is_none());
    }

    #[test]
    fn test_lock_when_locked_is_noop() {
        let session = SessionGuard::new();
        session.lock();
        session.lock();
        assert!(!session.is_unlocked());
    }

    #[test]
    fn test_reunlock_refreshes() {
        let session = SessionGuard::new();
        session.unlock([1u8; 32]);
        let first = session.unlocked_since().unwrap();

        session.unlock([2u8; 32]);
        assert_eq!(session.encryption_key_if_unlocked(), Some([2u8; 32]));
        assert!(session.unlocked_since().unwrap() >= first);
    }

    #[test]
    fn test_shared_access_across_threads() {
        use std::sync::Arc;

        let session = Arc::new(SessionGuard::new());
        session.unlock([3u8; 32]);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.encryption_key_if_unlocked())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some([3u8; 32]));
        }
    }
}
