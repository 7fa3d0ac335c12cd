//! Platform-specific paths for application data and configuration.

use std::path::PathBuf;

const APP_DIR: &str = "StreamVault";

/// Database file naming convention: the migrator derives its `.backup` and
/// temp-file siblings from this name.
pub const DATABASE_FILE: &str = "streamvault-database";

/// Platform data directory for the database file.
pub fn get_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".data")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Platform config directory for the preference store.
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

/// Default location of the media-library database.
pub fn default_database_path() -> PathBuf {
    get_data_dir().join(DATABASE_FILE)
}

/// Ensure the data directory exists.
pub fn ensure_data_dir() -> std::io::Result<PathBuf> {
    let dir = get_data_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_path_uses_convention() {
        let path = default_database_path();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            DATABASE_FILE
        );
    }

    #[test]
    fn test_dirs_are_nonempty() {
        assert!(!get_data_dir().as_os_str().is_empty());
        assert!(!get_config_dir().as_os_str().is_empty());
    }

    #[test]
    fn test_ensure_data_dir_creates_and_returns_data_dir() {
        let dir = ensure_data_dir().unwrap();
        assert_eq!(dir, get_data_dir());
        assert!(dir.is_dir());
    }
}
