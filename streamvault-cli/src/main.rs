use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use streamvault_core::platform::ensure_data_dir;
use streamvault_core::{
    default_database_path, DatabaseCryptoMigrator, FingerprintVerifier, LockCoordinator,
    OsKeychainEnclave, PrefStore, SecureEnclave,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

/// StreamVault key-lifecycle CLI
#[derive(Parser)]
#[command(name = "streamvault")]
#[command(about = "Manage PIN enrollment and database encryption for StreamVault", long_about = None)]
struct Cli {
    /// Path to the library database (defaults to the platform data dir)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show enrollment and encryption status
    Status,

    /// Enroll a 6-digit PIN (replaces any previous enrollment)
    Enroll,

    /// Verify a PIN against the stored enrollment
    Verify,

    /// Encrypt the library database with the key derived from your PIN
    EncryptDb,

    /// Decrypt the library database back to plaintext
    DecryptDb,

    /// Remove the enrollment and the enclave master key
    Disable,

    /// Enable or disable automatic locking on credential removal / timeout
    AutoLock {
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        enabled: bool,
    },

    /// Check a backup file against its checksum sidecar
    VerifyBackup {
        /// Backup file to check
        file: PathBuf,
    },

    /// Delete the migration backup and its checksum sidecar
    CleanupBackups,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let db_path = match cli.database.clone() {
        Some(path) => path,
        None => {
            ensure_data_dir().context("could not create the data directory")?;
            default_database_path()
        }
    };

    match cli.command {
        Commands::Status => status(&db_path),
        Commands::Enroll => enroll(),
        Commands::Verify => verify(),
        Commands::EncryptDb => migrate(&db_path, true),
        Commands::DecryptDb => migrate(&db_path, false),
        Commands::Disable => disable(),
        Commands::AutoLock { enabled } => auto_lock(enabled),
        Commands::VerifyBackup { file } => verify_backup(&file),
        Commands::CleanupBackups => cleanup_backups(&db_path),
    }
}

fn coordinator() -> Result<LockCoordinator> {
    let prefs = Arc::new(PrefStore::at_default_location()?);
    let enclave: Arc<dyn SecureEnclave> = Arc::new(OsKeychainEnclave::new());
    Ok(LockCoordinator::new(prefs, enclave))
}

fn prompt_pin(prompt: &str) -> Result<Zeroizing<String>> {
    let pin = rpassword::prompt_password(prompt).context("could not read PIN")?;
    Ok(Zeroizing::new(pin))
}

fn status(db_path: &PathBuf) -> Result<()> {
    let prefs = Arc::new(PrefStore::at_default_location()?);
    let enrolled = prefs.pin_encryption_enabled()?;
    let auto_lock = prefs.auto_lock_enabled()?;
    let verifier = FingerprintVerifier::new(Arc::clone(&prefs));

    println!("PIN enrolled:       {}", if enrolled { "yes" } else { "no" });
    println!("Auto-lock:          {}", if auto_lock { "on" } else { "off" });
    match verifier.last_verified() {
        Some(when) => println!("Last key verified:  {when}"),
        None => println!("Last key verified:  never"),
    }

    println!("Database:           {}", db_path.display());
    match DatabaseCryptoMigrator::new(db_path).is_database_encrypted() {
        Some(true) => println!("Database encrypted: yes"),
        Some(false) => println!("Database encrypted: no"),
        None => println!("Database encrypted: unknown (file missing or unreadable)"),
    }
    Ok(())
}

fn enroll() -> Result<()> {
    let coordinator = coordinator()?;
    if coordinator.is_pin_enrolled()? {
        println!("An enrollment already exists; it will be replaced.");
    }

    let pin = prompt_pin("Choose a 6-digit PIN: ")?;
    let confirm = prompt_pin("Confirm PIN: ")?;
    if *pin != *confirm {
        bail!("PINs do not match");
    }

    coordinator.enroll_pin(&pin)?;
    println!("PIN enrolled.");
    println!("Run `streamvault encrypt-db` to encrypt the library database.");
    Ok(())
}

fn verify() -> Result<()> {
    let coordinator = coordinator()?;
    let pin = prompt_pin("PIN: ")?;
    coordinator.unlock_application(&pin)?;
    println!("PIN verified.");
    Ok(())
}

fn migrate(db_path: &PathBuf, encrypt: bool) -> Result<()> {
    let coordinator = coordinator()?;
    let pin = prompt_pin("PIN: ")?;
    coordinator.unlock_application(&pin)?;
    let key = coordinator
        .encryption_key_if_unlocked()
        .ok_or_else(|| anyhow!("session is locked"))?;

    let migrator = DatabaseCryptoMigrator::new(db_path);
    let progress = |stage| println!("  [{stage}]");
    if encrypt {
        migrator.migrate_to_encrypted_with_progress(&key, progress)?;
        println!("Database encrypted: {}", db_path.display());
    } else {
        migrator.migrate_to_unencrypted_with_progress(&key, progress)?;
        println!("Database decrypted: {}", db_path.display());
    }
    println!(
        "A backup was kept at {}; run `streamvault cleanup-backups` once you \
         have confirmed the database works.",
        migrator.backup_path().display()
    );
    Ok(())
}

fn disable() -> Result<()> {
    let coordinator = coordinator()?;
    if !coordinator.is_pin_enrolled()? {
        println!("No enrollment to remove.");
        return Ok(());
    }
    coordinator.disable_encryption()?;
    println!("Enrollment removed. If the database is still encrypted, it can");
    println!("no longer be decrypted through this tool.");
    Ok(())
}

fn auto_lock(enabled: bool) -> Result<()> {
    let coordinator = coordinator()?;
    coordinator.set_auto_lock_enabled(enabled)?;
    println!("Auto-lock {}.", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn verify_backup(file: &PathBuf) -> Result<()> {
    let report = streamvault_core::checksum::verify_backup_integrity(file)
        .with_context(|| format!("could not read {}", file.display()))?;
    println!("{}", report.message);
    if let (Some(expected), Some(actual)) = (&report.expected, &report.actual) {
        if !report.is_success() {
            println!("  expected: {expected}");
            println!("  actual:   {actual}");
        }
    }
    if report.is_success() {
        Ok(())
    } else {
        bail!("backup verification failed")
    }
}

fn cleanup_backups(db_path: &PathBuf) -> Result<()> {
    let migrator = DatabaseCryptoMigrator::new(db_path);
    migrator.cleanup_backups()?;
    println!("Backups removed.");
    Ok(())
}
