mod catalog_db;
mod config;
pub mod migrations;
mod snapshot_db;

pub use catalog_db::{CatalogDb, UserRecord};
pub use config::{AdminsConfig, Config, StorageBackend, StorageConfig};
pub use snapshot_db::SqliteSnapshotStore;

use std::path::PathBuf;

/// File name of the SQLite database inside [`data_dir`].
pub const DB_FILE: &str = "questdeck.db";

/// Returns the data directory, creating it if needed.
///
/// `QUESTDECK_HOME` wins when set. Otherwise `~/.config/questdeck[-dev]/`,
/// with `QUESTDECK_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("QUESTDECK_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("QUESTDECK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("questdeck-dev")
            } else {
                base_dir.join("questdeck")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
