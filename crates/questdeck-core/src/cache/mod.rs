//! Per-user snapshot cache.
//!
//! [`LocalCache`] stores one [`CachedSelection`] per (user, category) on top
//! of any [`SnapshotStore`]: a composite-key get/put of raw JSON. Backends
//! must make `put` atomic to concurrent readers; a reader sees the old
//! payload or the new one, never a mix.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, StoreError};
use crate::model::{CachedSelection, Category, Challenge, UserId};

/// Composite key of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotKey {
    pub user_id: UserId,
    pub category: Category,
}

impl SnapshotKey {
    pub fn new(user_id: impl Into<UserId>, category: Category) -> Self {
        Self {
            user_id: user_id.into(),
            category,
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.category)
    }
}

/// Backing medium for snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Fetch the raw payload stored under `key`.
    fn get(&self, key: &SnapshotKey) -> Result<Option<String>, StoreError>;

    /// Replace the payload under `key` in one atomic step.
    fn put(&self, key: &SnapshotKey, payload: &str) -> Result<(), StoreError>;

    /// Every key currently holding a payload.
    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError>;
}

/// On-disk layout of a snapshot. User and category live in the key.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotPayload {
    items: Vec<Challenge>,
    timestamp: DateTime<Utc>,
}

/// Typed view over a [`SnapshotStore`].
#[derive(Clone)]
pub struct LocalCache {
    store: Arc<dyn SnapshotStore>,
}

impl LocalCache {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Load the selection for `(user_id, category)`.
    ///
    /// # Errors
    /// [`CacheError::Read`] when the store fails, [`CacheError::Corrupt`]
    /// when the stored payload does not decode.
    pub fn load(
        &self,
        user_id: &str,
        category: Category,
    ) -> Result<Option<CachedSelection>, CacheError> {
        let key = SnapshotKey::new(user_id, category);
        let raw = self.store.get(&key).map_err(|source| CacheError::Read {
            key: key.to_string(),
            source,
        })?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let payload: SnapshotPayload =
            serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })?;
        Ok(Some(CachedSelection {
            user_id: key.user_id,
            category,
            items: payload.items,
            timestamp: payload.timestamp,
        }))
    }

    /// Replace the stored selection wholesale.
    ///
    /// # Errors
    /// Returns an error if the selection cannot be encoded or written.
    pub fn save(&self, selection: &CachedSelection) -> Result<(), CacheError> {
        let key = SnapshotKey::new(selection.user_id.clone(), selection.category);
        let payload = SnapshotPayload {
            items: selection.items.clone(),
            timestamp: selection.timestamp,
        };
        let raw = serde_json::to_string(&payload).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.store
            .put(&key, &raw)
            .map_err(|source| CacheError::Write {
                key: key.to_string(),
                source,
            })
    }

    /// Keys of every stored snapshot.
    pub fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        self.store.keys()
    }
}
