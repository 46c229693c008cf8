//! One JSON file per snapshot: `<root>/<user_id>/<category>.json`.
//!
//! Writes go to a uniquely named temp file in the same directory and are
//! renamed over the target, so readers never observe a partial file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{SnapshotKey, SnapshotStore};
use crate::error::StoreError;
use crate::model::Category;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &SnapshotKey) -> Result<PathBuf, StoreError> {
        let user = key.user_id.as_str();
        let usable = !user.is_empty()
            && user != "."
            && user != ".."
            && !user.contains(['/', '\\', '\0']);
        if !usable {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self
            .root
            .join(user)
            .join(format!("{}.{EXTENSION}", key.category)))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl SnapshotStore for FileStore {
    fn get(&self, key: &SnapshotKey) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    fn put(&self, key: &SnapshotKey, payload: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

        let tmp = dir.join(format!(".{}.{}.tmp", key.category, Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, payload) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&tmp, e));
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(&path, e));
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        let users = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, e)),
        };

        let mut keys = Vec::new();
        for user_dir in users {
            let user_dir = user_dir.map_err(|e| io_error(&self.root, e))?;
            if !user_dir.path().is_dir() {
                continue;
            }
            let user_id = user_dir.file_name().to_string_lossy().into_owned();
            for category in Category::ALL {
                let key = SnapshotKey::new(user_id.clone(), category);
                if self.path_for(&key)?.is_file() {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
