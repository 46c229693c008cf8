//! Core error types for questdeck-core.
//!
//! The hierarchy mirrors the failure scopes of the rotation core: the
//! snapshot store, the cached selection on top of it, the external catalog,
//! and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for questdeck-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Snapshot cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Catalog query or mutation errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Raw snapshot store errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Caller lacks the administrator capability
    #[error("User '{user_id}' is not allowed to {action}")]
    Unauthorized {
        user_id: String,
        action: &'static str,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised by a [`SnapshotStore`](crate::cache::SnapshotStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open snapshot store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Snapshot store is locked")]
    Locked,

    /// Filesystem failure in a file-backed store
    #[error("IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key cannot be mapped onto the backing medium
    #[error("Invalid snapshot key '{0}'")]
    InvalidKey(String),

    /// A lock guarding in-process state was poisoned
    #[error("Snapshot store lock poisoned")]
    Poisoned,
}

/// Errors loading or saving a cached selection.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store could not be read
    #[error("Failed to read snapshot {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Stored payload is not a valid snapshot
    #[error("Corrupt snapshot {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot could not be encoded
    #[error("Failed to encode snapshot {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The store rejected the write
    #[error("Failed to write snapshot {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },
}

impl CacheError {
    /// Whether the stored payload itself is unusable (as opposed to the store
    /// being unreachable).
    pub fn is_corrupt(&self) -> bool {
        matches!(self, CacheError::Corrupt { .. })
    }
}

/// Catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Failed to open catalog database
    #[error("Failed to open catalog at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Catalog query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Catalog migration failed: {0}")]
    MigrationFailed(String),

    /// Referenced challenge does not exist
    #[error("Challenge not found: {0}")]
    NotFound(String),

    /// Database is locked
    #[error("Catalog is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved
    #[error("Data directory unavailable: {0}")]
    DataDir(#[source] std::io::Error),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Unknown challenge category
    #[error("Unknown category '{0}' (expected 'daily' or 'weekly')")]
    UnknownCategory(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if is_locked(e.code) => StoreError::Locked,
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if is_locked(e.code) => CatalogError::Locked,
            _ => CatalogError::QueryFailed(err.to_string()),
        }
    }
}

fn is_locked(code: rusqlite::ErrorCode) -> bool {
    matches!(
        code,
        rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy
    )
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
