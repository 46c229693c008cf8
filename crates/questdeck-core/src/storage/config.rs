//! TOML-based application configuration.
//!
//! Holds:
//! - Rotation sizes and the local day boundary
//! - Propagation fan-out limits
//! - Snapshot storage backend
//! - Administrator ids
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{data_dir, SqliteSnapshotStore, DB_FILE};
use crate::cache::{FileStore, SnapshotStore};
use crate::error::{ConfigError, CoreError};
use crate::propagation::PropagationConfig;
use crate::rotation::RotationConfig;

const CONFIG_FILE: &str = "config.toml";

/// Where snapshots are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// `snapshots` table next to the catalog
    #[default]
    Sqlite,
    /// One JSON file per snapshot
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root for the file backend. Defaults to `<data_dir>/snapshots`.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Open the configured snapshot store.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open_store(&self) -> Result<Arc<dyn SnapshotStore>, CoreError> {
        let store: Arc<dyn SnapshotStore> = match self.backend {
            StorageBackend::Sqlite => Arc::new(SqliteSnapshotStore::open_at(data_dir()?.join(DB_FILE))?),
            StorageBackend::File => {
                let root = match &self.snapshot_dir {
                    Some(dir) => dir.clone(),
                    None => data_dir()?.join("snapshots"),
                };
                Arc::new(FileStore::new(root))
            }
        };
        Ok(store)
    }
}

/// Users granted the administrator capability regardless of the database flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminsConfig {
    #[serde(default)]
    pub user_ids: Vec<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub admins: AdminsConfig,
}

fn too_large(raw: &str) -> String {
    format!("'{raw}' exceeds the largest storable integer ({})", i64::MAX)
}

impl Config {
    fn lookup<'a>(root: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |node, part| node.get(part))
    }

    /// Parse `raw` into the JSON type already held at the target key.
    fn coerce(key: &str, existing: &serde_json::Value, raw: &str) -> Result<serde_json::Value, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        // Clearing only deserializes into optional fields.
        if matches!(raw, "none" | "null") {
            return Ok(serde_json::Value::Null);
        }

        let value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                raw.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => match raw.parse::<i64>() {
                Ok(n) => serde_json::Value::from(n),
                Err(_) if raw.parse::<u64>().is_ok() => return Err(invalid(too_large(raw))),
                Err(_) => return Err(invalid(format!("cannot parse '{raw}' as integer"))),
            },
            serde_json::Value::Array(_) => {
                if raw.trim_start().starts_with('[') {
                    serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?
                } else {
                    serde_json::Value::Array(
                        raw.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(|s| serde_json::Value::String(s.to_string()))
                            .collect(),
                    )
                }
            }
            serde_json::Value::Object(_) => {
                serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?
            }
            // Unset optional field: numbers stay numbers, anything else is text.
            serde_json::Value::Null => match serde_json::from_str::<serde_json::Value>(raw) {
                // TOML integers are signed 64-bit; anything larger cannot be saved.
                Ok(v) if v.is_u64() && v.as_i64().is_none() => return Err(invalid(too_large(raw))),
                Ok(v) if v.is_number() || v.is_boolean() => v,
                _ => serde_json::Value::String(raw.to_string()),
            },
            serde_json::Value::String(_) => serde_json::Value::String(raw.to_string()),
        };
        Ok(value)
    }

    fn assign(root: &mut serde_json::Value, key: &str, raw: &str) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut parent = root;
        if let Some(path) = parent_path {
            for part in path.split('.') {
                parent = parent.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = parent.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;
        let value = Self::coerce(key, existing, raw)?;
        obj.insert(leaf.to_string(), value);
        Ok(())
    }

    /// Default location of the config file.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir().map_err(ConfigError::DataDir)?.join(CONFIG_FILE))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// defaults cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// defaults cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, falling back to defaults on any error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Persist to the default location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to `path`.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::lookup(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key, type-checked against the current
    /// value. Does not persist; call [`save`](Self::save) afterwards.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value does not fit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::assign(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
