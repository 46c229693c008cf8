use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::migrations;
use crate::cache::{SnapshotKey, SnapshotStore};
use crate::error::StoreError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot rows in the `snapshots` table. A write is a single
/// `INSERT OR REPLACE`, so readers see the old row or the new one.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotStore {
    /// Open (or create) the store at `path`. Usually the same file as the
    /// catalog.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn get(&self, key: &SnapshotKey) -> Result<Option<String>, StoreError> {
        let payload = self
            .conn()
            .query_row(
                "SELECT payload FROM snapshots WHERE user_id = ?1 AND category = ?2",
                params![key.user_id, key.category.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn put(&self, key: &SnapshotKey, payload: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO snapshots (user_id, category, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key.user_id, key.category.as_str(), payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<SnapshotKey>, StoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT user_id, category FROM snapshots ORDER BY user_id, category")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut keys = Vec::new();
        for row in rows {
            let (user_id, category) = row?;
            match category.parse() {
                Ok(category) => keys.push(SnapshotKey::new(user_id, category)),
                Err(e) => tracing::warn!(user_id, error = %e, "skipping snapshot row"),
            }
        }
        Ok(keys)
    }
}
