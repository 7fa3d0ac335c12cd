//! One-time migration of the library database between plaintext and
//! SQLCipher-encrypted form.
//!
//! The transform is whole-file and runs as a fixed step sequence:
//! backup → attach → export → detach → verify → replace, with any failure
//! after the backup rolling the original file back from the `.backup`
//! sibling. The backup is only ever removed by an explicit
//! [`DatabaseCryptoMigrator::cleanup_backups`] call, never as a side effect
//! of success, so callers can verify application-level correctness before
//! discarding the safety copy.
//!
//! Keys reach SQLCipher as raw hex literals (`x'…'`). Passing the hex as a
//! text passphrase instead would silently run it through SQLCipher's own
//! PBKDF2 and produce an unreadable database.
//!
//! Rollback deletes the partial temp file and the (possibly corrupt)
//! original, then copies the backup over the original path. A process death
//! between those two operations leaves no database until the backup is
//! restored by the next run; the safer rename-based sequence is a known
//! alternative, but the delete-then-copy semantics are kept deliberately.
//!
//! Migration is not cancellable mid-flight: a partial export would corrupt
//! state, so callers let it run to completion and rely on rollback after a
//! process-level failure.

use crate::checksum;
use rusqlite::Connection;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

const BACKUP_SUFFIX: &str = ".backup";
const TEMP_ENCRYPTED_SUFFIX: &str = ".temp-encrypted";
const TEMP_DECRYPTED_SUFFIX: &str = ".temp-decrypted";

/// Schema-bookkeeping table that the export would collide on if a stale
/// target already contains it. Dropped best-effort before export.
const COLLIDING_METADATA_TABLE: &str = "library_metadata";

const SQLITE_PLAINTEXT_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// The step at which a migration failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStage {
    Validate,
    Backup,
    OpenSource,
    Attach,
    DropMetadata,
    Export,
    Detach,
    CloseSource,
    Verify,
    Replace,
    Finalize,
}

impl fmt::Display for MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationStage::Validate => "validate",
            MigrationStage::Backup => "backup",
            MigrationStage::OpenSource => "open-source",
            MigrationStage::Attach => "attach",
            MigrationStage::DropMetadata => "drop-metadata",
            MigrationStage::Export => "export",
            MigrationStage::Detach => "detach",
            MigrationStage::CloseSource => "close-source",
            MigrationStage::Verify => "verify",
            MigrationStage::Replace => "replace",
            MigrationStage::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Errors from database crypto migration
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid key size: expected {expected} bytes, got {got}")]
    InvalidKeySize { expected: usize, got: usize },

    #[error("Database file not found: {0}")]
    DatabaseMissing(PathBuf),

    #[error("A migration is already in progress for {0}")]
    AlreadyInProgress(PathBuf),

    /// An ordinary migration failure. `rolled_back` reports whether the
    /// original file was restored from backup.
    #[error("Migration failed at {stage} stage (rolled back: {rolled_back}): {cause}")]
    Step {
        stage: MigrationStage,
        rolled_back: bool,
        cause: String,
    },

    /// Fatal: the migration failed and the rollback also failed. Neither a
    /// valid encrypted nor a valid plaintext database is guaranteed to
    /// exist; the backup file is the remaining recovery anchor.
    #[error("Migration failed at {stage} stage AND rollback failed: {cause}; rollback error: {rollback_cause}")]
    RollbackFailed {
        stage: MigrationStage,
        cause: String,
        rollback_cause: String,
    },
}

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

// ── Single-flight guard ─────────────────────────────────────────────────

fn active_migrations() -> &'static Mutex<HashSet<PathBuf>> {
    static ACTIVE: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    ACTIVE.get_or_init(|| Mutex::new(HashSet::new()))
}

/// RAII registration of an in-flight migration, keyed by canonical database
/// path. Two migrations against the same file are never interleaved; the
/// second fails with `AlreadyInProgress`.
struct FlightGuard {
    path: PathBuf,
}

impl FlightGuard {
    fn acquire(path: &Path) -> Result<Self> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut active = match active_migrations().lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !active.insert(key.clone()) {
            return Err(MigrationError::AlreadyInProgress(key));
        }
        Ok(Self { path: key })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut active = match active_migrations().lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.remove(&self.path);
    }
}

// ── Migrator ────────────────────────────────────────────────────────────

/// Performs the one-time, atomic transform of the database file between
/// plaintext and SQLCipher-encrypted form.
pub struct DatabaseCryptoMigrator {
    db_path: PathBuf,
}

impl DatabaseCryptoMigrator {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Migrator for the default database location.
    pub fn at_default_location() -> Self {
        Self::new(crate::platform::default_database_path())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// The `.backup` sibling used as the rollback anchor.
    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.db_path, BACKUP_SUFFIX)
    }

    fn temp_path(&self, direction: Direction) -> PathBuf {
        match direction {
            Direction::Encrypt => sibling(&self.db_path, TEMP_ENCRYPTED_SUFFIX),
            Direction::Decrypt => sibling(&self.db_path, TEMP_DECRYPTED_SUFFIX),
        }
    }

    /// Whether the on-disk file is SQLCipher-encrypted.
    ///
    /// `None` means indeterminate (file absent or unreadable). Decided by
    /// the SQLite plaintext magic header; an encrypted file has a random
    /// first page.
    pub fn is_database_encrypted(&self) -> Option<bool> {
        let mut file = fs::File::open(&self.db_path).ok()?;
        let len = file.metadata().ok()?.len();
        if len == 0 {
            // A zero-length file is what SQLite treats as a fresh plaintext
            // database.
            return Some(false);
        }
        if len < SQLITE_PLAINTEXT_MAGIC.len() as u64 {
            return None;
        }

        // Only the 16-byte header is needed; the library file can be huge.
        let mut header = [0u8; 16];
        file.read_exact(&mut header).ok()?;
        Some(header != *SQLITE_PLAINTEXT_MAGIC)
    }

    /// Encrypt the plaintext database in place with `key` (32 bytes).
    pub fn migrate_to_encrypted(&self, key: &[u8]) -> Result<()> {
        self.migrate_to_encrypted_with_progress(key, |_| {})
    }

    /// Encrypt with a per-stage progress callback. The callback runs on the
    /// calling thread; any UI marshalling is the caller's concern.
    pub fn migrate_to_encrypted_with_progress(
        &self,
        key: &[u8],
        progress: impl FnMut(MigrationStage),
    ) -> Result<()> {
        self.migrate(key, Direction::Encrypt, progress)
    }

    /// Decrypt the encrypted database in place, given its current key.
    pub fn migrate_to_unencrypted(&self, key: &[u8]) -> Result<()> {
        self.migrate_to_unencrypted_with_progress(key, |_| {})
    }

    pub fn migrate_to_unencrypted_with_progress(
        &self,
        key: &[u8],
        progress: impl FnMut(MigrationStage),
    ) -> Result<()> {
        self.migrate(key, Direction::Decrypt, progress)
    }

    fn migrate(
        &self,
        key: &[u8],
        direction: Direction,
        mut progress: impl FnMut(MigrationStage),
    ) -> Result<()> {
        progress(MigrationStage::Validate);

        // Guards against silently encrypting with a truncated or garbage
        // key: fail fast before touching any file.
        if key.len() != 32 {
            return Err(MigrationError::InvalidKeySize {
                expected: 32,
                got: key.len(),
            });
        }
        if !self.db_path.exists() {
            return Err(MigrationError::DatabaseMissing(self.db_path.clone()));
        }

        let _flight = FlightGuard::acquire(&self.db_path)?;
        let key_hex = Zeroizing::new(hex::encode(key));

        info!(
            "Starting database migration ({:?}) for {}",
            direction,
            self.db_path.display()
        );

        // Backup: the rollback anchor for every subsequent step. Nothing has
        // been modified yet, so a failure here needs no restoration.
        progress(MigrationStage::Backup);
        let backup = self.backup_path();
        fs::copy(&self.db_path, &backup).map_err(|e| MigrationError::Step {
            stage: MigrationStage::Backup,
            rolled_back: false,
            cause: e.to_string(),
        })?;
        if let Err(e) = checksum::save_checksum_metadata(&backup) {
            warn!("Could not write backup checksum sidecar: {e}");
        }

        match self.run_steps(direction, &key_hex, &mut progress) {
            Ok(()) => {
                info!("Database migration complete: {}", self.db_path.display());
                Ok(())
            }
            Err((stage, cause)) => {
                warn!("Migration failed at {stage} stage: {cause}; rolling back");
                match self.rollback(direction) {
                    Ok(()) => Err(MigrationError::Step {
                        stage,
                        rolled_back: true,
                        cause,
                    }),
                    Err(rb) => Err(MigrationError::RollbackFailed {
                        stage,
                        cause,
                        rollback_cause: rb.to_string(),
                    }),
                }
            }
        }
    }

    /// The attach/export/verify/replace sequence. Errors carry the failed
    /// stage; the caller owns rollback.
    fn run_steps(
        &self,
        direction: Direction,
        key_hex: &str,
        progress: &mut impl FnMut(MigrationStage),
    ) -> std::result::Result<(), (MigrationStage, String)> {
        let temp = self.temp_path(direction);

        // A stale temp file from an earlier failed run must not leak into
        // the attach.
        if temp.exists() {
            fs::remove_file(&temp).map_err(|e| (MigrationStage::Attach, e.to_string()))?;
        }

        progress(MigrationStage::OpenSource);
        let conn = Connection::open(&self.db_path)
            .map_err(|e| (MigrationStage::OpenSource, e.to_string()))?;

        if direction == Direction::Decrypt {
            conn.execute_batch(&format!("PRAGMA key = \"x'{key_hex}'\";"))
                .map_err(|e| (MigrationStage::OpenSource, e.to_string()))?;
            // A wrong key surfaces on the first real read, not on the PRAGMA.
            conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(|e| (MigrationStage::OpenSource, e.to_string()))?;
        }

        progress(MigrationStage::Attach);
        let temp_sql = sql_quote_path(&temp);
        let attach_sql = match direction {
            // The key must be the x'…' hex literal, embedded in the SQL: a
            // bound parameter would be treated as a text passphrase.
            Direction::Encrypt => {
                format!("ATTACH DATABASE '{temp_sql}' AS target KEY \"x'{key_hex}'\";")
            }
            Direction::Decrypt => format!("ATTACH DATABASE '{temp_sql}' AS target KEY '';"),
        };
        conn.execute_batch(&attach_sql)
            .map_err(|e| (MigrationStage::Attach, e.to_string()))?;

        // Best-effort: an export into a target that already carries our
        // schema-bookkeeping table would collide.
        progress(MigrationStage::DropMetadata);
        if let Err(e) = conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS target.{COLLIDING_METADATA_TABLE};"
        )) {
            warn!("Could not drop stale metadata table in target: {e}");
        }

        progress(MigrationStage::Export);
        conn.execute_batch("SELECT sqlcipher_export('target');")
            .map_err(|e| (MigrationStage::Export, e.to_string()))?;

        // The target file is fully written at this point; a detach failure
        // is logged, not fatal.
        progress(MigrationStage::Detach);
        if let Err(e) = conn.execute_batch("DETACH DATABASE target;") {
            warn!("Could not detach target database: {e}");
        }

        progress(MigrationStage::CloseSource);
        conn.close()
            .map_err(|(_, e)| (MigrationStage::CloseSource, e.to_string()))?;

        progress(MigrationStage::Verify);
        self.verify_target(&temp, direction, key_hex)
            .map_err(|cause| (MigrationStage::Verify, cause))?;

        // Replace: both the delete and the rename must succeed, or the
        // whole operation is a failure requiring rollback.
        progress(MigrationStage::Replace);
        fs::remove_file(&self.db_path).map_err(|e| (MigrationStage::Replace, e.to_string()))?;
        fs::rename(&temp, &self.db_path).map_err(|e| (MigrationStage::Replace, e.to_string()))?;

        progress(MigrationStage::Finalize);
        if !self.db_path.exists() {
            return Err((
                MigrationStage::Finalize,
                "database file missing after replace".to_string(),
            ));
        }

        Ok(())
    }

    /// The new file must exist, be non-empty, open with the expected key,
    /// and contain at least one table. A zero-table result is an export
    /// failure, not a success.
    fn verify_target(
        &self,
        temp: &Path,
        direction: Direction,
        key_hex: &str,
    ) -> std::result::Result<(), String> {
        let meta = fs::metadata(temp).map_err(|e| e.to_string())?;
        if meta.len() == 0 {
            return Err("exported database is empty".to_string());
        }

        let conn = Connection::open(temp).map_err(|e| e.to_string())?;
        if direction == Direction::Encrypt {
            conn.execute_batch(&format!("PRAGMA key = \"x'{key_hex}'\";"))
                .map_err(|e| e.to_string())?;
        }

        let tables: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;

        if tables == 0 {
            return Err("exported database contains no tables".to_string());
        }
        Ok(())
    }

    /// Restore the original file from the backup: delete the partial temp
    /// file, delete the possibly-corrupt original, copy the backup back.
    fn rollback(&self, direction: Direction) -> std::io::Result<()> {
        let temp = self.temp_path(direction);
        if temp.exists() {
            fs::remove_file(&temp)?;
        }
        if self.db_path.exists() {
            fs::remove_file(&self.db_path)?;
        }
        fs::copy(self.backup_path(), &self.db_path)?;
        info!("Rolled back migration; original database restored from backup");
        Ok(())
    }

    /// Explicitly discard the backup file and its checksum sidecar. Never
    /// called automatically.
    pub fn cleanup_backups(&self) -> std::io::Result<()> {
        let backup = self.backup_path();
        if backup.exists() {
            fs::remove_file(&backup)?;
        }
        let sidecar = PathBuf::from(format!("{}.checksum", backup.display()));
        if sidecar.exists() {
            fs::remove_file(&sidecar)?;
        }
        info!("Migration backups cleaned up for {}", self.db_path.display());
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Escape a filesystem path for embedding in a single-quoted SQL literal.
fn sql_quote_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_plaintext_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE channels (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             INSERT INTO channels (name) VALUES ('one'), ('two'), ('three');",
        )
        .unwrap();
        conn.close().unwrap();
    }

    #[test]
    fn test_invalid_key_size_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);
        let before = fs::read(&db).unwrap();

        let migrator = DatabaseCryptoMigrator::new(&db);
        let result = migrator.migrate_to_encrypted(&[0u8; 16]);
        assert!(matches!(
            result,
            Err(MigrationError::InvalidKeySize {
                expected: 32,
                got: 16
            })
        ));

        // Nothing was touched: no backup, file byte-identical.
        assert!(!migrator.backup_path().exists());
        assert_eq!(fs::read(&db).unwrap(), before);
    }

    #[test]
    fn test_missing_database_fails_without_rollback() {
        let dir = tempfile::tempdir().unwrap();
        let migrator = DatabaseCryptoMigrator::new(dir.path().join("absent"));
        assert!(matches!(
            migrator.migrate_to_encrypted(&[1u8; 32]),
            Err(MigrationError::DatabaseMissing(_))
        ));
        assert_eq!(migrator.is_database_encrypted(), None);
    }

    #[test]
    fn test_encryption_detection() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);

        let migrator = DatabaseCryptoMigrator::new(&db);
        assert_eq!(migrator.is_database_encrypted(), Some(false));

        migrator.migrate_to_encrypted(&[9u8; 32]).unwrap();
        assert_eq!(migrator.is_database_encrypted(), Some(true));
    }

    #[test]
    fn test_encryption_detection_handles_empty_and_truncated_files() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");

        fs::write(&db, b"").unwrap();
        assert_eq!(
            DatabaseCryptoMigrator::new(&db).is_database_encrypted(),
            Some(false)
        );

        fs::write(&db, b"short").unwrap();
        assert_eq!(DatabaseCryptoMigrator::new(&db).is_database_encrypted(), None);
    }

    #[test]
    fn test_zero_table_export_fails_verify_and_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");

        // A valid database with a written header but no tables at all; the
        // export succeeds mechanically but produces nothing worth keeping.
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch("PRAGMA user_version = 7;").unwrap();
        conn.close().unwrap();
        let before = fs::read(&db).unwrap();

        let migrator = DatabaseCryptoMigrator::new(&db);
        match migrator.migrate_to_encrypted(&[4u8; 32]) {
            Err(MigrationError::Step {
                stage,
                rolled_back,
                ..
            }) => {
                assert_eq!(stage, MigrationStage::Verify);
                assert!(rolled_back);
            }
            other => panic!("expected Step error at Verify, got {other:?}"),
        }

        // Original restored byte-for-byte, no temp file left behind.
        assert_eq!(fs::read(&db).unwrap(), before);
        assert!(!sibling(&db, TEMP_ENCRYPTED_SUFFIX).exists());
        assert_eq!(migrator.is_database_encrypted(), Some(false));
    }

    #[test]
    fn test_rollback_without_backup_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);

        let migrator = DatabaseCryptoMigrator::new(&db);
        migrator.migrate_to_encrypted(&[5u8; 32]).unwrap();

        // Losing the backup after it was taken turns an ordinary failure
        // (wrong key) into the fatal variant: rollback has nothing to
        // restore from.
        let backup = migrator.backup_path();
        let result = migrator.migrate_to_unencrypted_with_progress(&[6u8; 32], |stage| {
            if stage == MigrationStage::OpenSource {
                fs::remove_file(&backup).unwrap();
            }
        });

        match result {
            Err(MigrationError::RollbackFailed { stage, .. }) => {
                assert_eq!(stage, MigrationStage::OpenSource);
            }
            other => panic!("expected RollbackFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_single_flight_rejects_concurrent_migration() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);

        let _guard = FlightGuard::acquire(&db).unwrap();
        let migrator = DatabaseCryptoMigrator::new(&db);
        assert!(matches!(
            migrator.migrate_to_encrypted(&[1u8; 32]),
            Err(MigrationError::AlreadyInProgress(_))
        ));
    }

    #[test]
    fn test_flight_guard_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);

        drop(FlightGuard::acquire(&db).unwrap());
        let migrator = DatabaseCryptoMigrator::new(&db);
        migrator.migrate_to_encrypted(&[1u8; 32]).unwrap();
    }

    #[test]
    fn test_wrong_key_decrypt_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);

        let migrator = DatabaseCryptoMigrator::new(&db);
        migrator.migrate_to_encrypted(&[5u8; 32]).unwrap();
        let encrypted_bytes = fs::read(&db).unwrap();

        let result = migrator.migrate_to_unencrypted(&[6u8; 32]);
        match result {
            Err(MigrationError::Step {
                stage,
                rolled_back,
                ..
            }) => {
                assert_eq!(stage, MigrationStage::OpenSource);
                assert!(rolled_back);
            }
            other => panic!("expected Step error, got {other:?}"),
        }

        // Original restored byte-for-byte from backup and still encrypted.
        assert_eq!(fs::read(&db).unwrap(), encrypted_bytes);
        assert_eq!(migrator.is_database_encrypted(), Some(true));

        // And the correct key still works.
        migrator.migrate_to_unencrypted(&[5u8; 32]).unwrap();
        assert_eq!(migrator.is_database_encrypted(), Some(false));
    }

    #[test]
    fn test_progress_reports_stages_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);

        let mut stages = Vec::new();
        DatabaseCryptoMigrator::new(&db)
            .migrate_to_encrypted_with_progress(&[3u8; 32], |stage| stages.push(stage))
            .unwrap();

        assert_eq!(
            stages,
            vec![
                MigrationStage::Validate,
                MigrationStage::Backup,
                MigrationStage::OpenSource,
                MigrationStage::Attach,
                MigrationStage::DropMetadata,
                MigrationStage::Export,
                MigrationStage::Detach,
                MigrationStage::CloseSource,
                MigrationStage::Verify,
                MigrationStage::Replace,
                MigrationStage::Finalize,
            ]
        );
    }

    #[test]
    fn test_backup_kept_until_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);
        let plaintext_bytes = fs::read(&db).unwrap();

        let migrator = DatabaseCryptoMigrator::new(&db);
        migrator.migrate_to_encrypted(&[7u8; 32]).unwrap();

        // Success does not discard the backup; it still matches the
        // pre-migration file and carries a checksum sidecar.
        let backup = migrator.backup_path();
        assert_eq!(fs::read(&backup).unwrap(), plaintext_bytes);
        let report = checksum::verify_backup_integrity(&backup).unwrap();
        assert!(report.is_success());

        migrator.cleanup_backups().unwrap();
        assert!(!backup.exists());
        // Cleaning again is a no-op.
        migrator.cleanup_backups().unwrap();
    }

    #[test]
    fn test_stale_temp_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("streamvault-database");
        create_plaintext_db(&db);

        let migrator = DatabaseCryptoMigrator::new(&db);
        let stale = sibling(&db, TEMP_ENCRYPTED_SUFFIX);
        fs::write(&stale, b"stale garbage from a crashed run").unwrap();

        migrator.migrate_to_encrypted(&[8u8; 32]).unwrap();
        assert!(!stale.exists());
        assert_eq!(migrator.is_database_encrypted(), Some(true));
    }
}
