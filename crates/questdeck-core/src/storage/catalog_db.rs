//! SQLite-backed challenge catalog, user registry and completion log.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, migrations, DB_FILE};
use crate::catalog::{AdminPolicy, Catalog};
use crate::error::{CatalogError, Result};
use crate::model::{Category, Challenge, ChallengeId, ChallengePatch, CompletionRecord, UserId};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CHALLENGE_COLUMNS: &str =
    "id, title, text, category, character, allows_drawing, created_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

fn conversion_error(column: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_datetime(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn row_to_challenge(row: &rusqlite::Row) -> rusqlite::Result<Challenge> {
    let category: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    Ok(Challenge {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        category: category.parse().map_err(|e| conversion_error(3, e))?,
        character: row.get(4)?,
        allows_drawing: row.get(5)?,
        created_at: parse_datetime(6, &created_at)?,
    })
}

/// Catalog database. Also answers the administrator capability check from
/// the `users.is_admin` flag.
pub struct CatalogDb {
    conn: Mutex<Connection>,
}

impl CatalogDb {
    /// Open the database at `<data_dir>/questdeck.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened
    /// or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join(DB_FILE);
        Ok(Self::open_at(path)?)
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| CatalogError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, CatalogError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::migrate(&conn).map_err(|e| CatalogError::MigrationFailed(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a challenge to the catalog.
    ///
    /// # Errors
    /// Fails if a challenge with the same id already exists.
    pub fn insert_challenge(&self, challenge: &Challenge) -> Result<(), CatalogError> {
        self.conn().execute(
            "INSERT INTO challenges (id, title, text, category, character, allows_drawing, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                challenge.id,
                challenge.title,
                challenge.text,
                challenge.category.as_str(),
                challenge.character,
                challenge.allows_drawing,
                challenge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Every challenge, oldest first.
    pub fn list_challenges(&self) -> Result<Vec<Challenge>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], row_to_challenge)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Register a user, or update the admin flag of an existing one.
    pub fn add_user(&self, user_id: &str, is_admin: bool) -> Result<(), CatalogError> {
        self.conn().execute(
            "INSERT INTO users (id, is_admin, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET is_admin = excluded.is_admin",
            params![user_id, is_admin, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn list_users(&self) -> Result<Vec<UserRecord>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, is_admin, created_at FROM users ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let created_at: String = row.get(2)?;
            Ok(UserRecord {
                id: row.get(0)?,
                is_admin: row.get(1)?,
                created_at: parse_datetime(2, &created_at)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Mark a challenge completed for a user. Re-completing keeps the latest time.
    pub fn record_completion(
        &self,
        user_id: &str,
        challenge_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO completions (user_id, challenge_id, completed_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, challenge_id, completed_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn completions(&self, user_id: &str) -> Result<Vec<CompletionRecord>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, challenge_id, completed_at FROM completions
             WHERE user_id = ?1 ORDER BY completed_at",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let completed_at: String = row.get(2)?;
            Ok(CompletionRecord {
                user_id: row.get(0)?,
                challenge_id: row.get(1)?,
                completed_at: parse_datetime(2, &completed_at)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl Catalog for CatalogDb {
    fn list_by_category(&self, category: Category) -> Result<Vec<Challenge>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE category = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![category.as_str()], row_to_challenge)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_user_ids(&self) -> Result<Vec<UserId>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM users WHERE is_admin = 0 ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_completed_ids(&self, user_id: &str) -> Result<HashSet<ChallengeId>, CatalogError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT challenge_id FROM completions WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
    }

    fn get_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>, CatalogError> {
        let conn = self.conn();
        let challenge = conn
            .query_row(
                &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1"),
                params![challenge_id],
                row_to_challenge,
            )
            .optional()?;
        Ok(challenge)
    }

    fn update_challenge(
        &self,
        challenge_id: &str,
        patch: &ChallengePatch,
    ) -> Result<Challenge, CatalogError> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let mut challenge = tx
            .query_row(
                &format!("SELECT {CHALLENGE_COLUMNS} FROM challenges WHERE id = ?1"),
                params![challenge_id],
                row_to_challenge,
            )
            .optional()?
            .ok_or_else(|| CatalogError::NotFound(challenge_id.to_string()))?;

        challenge.apply_patch(patch);
        tx.execute(
            "UPDATE challenges
             SET title = ?2, text = ?3, category = ?4, character = ?5, allows_drawing = ?6
             WHERE id = ?1",
            params![
                challenge.id,
                challenge.title,
                challenge.text,
                challenge.category.as_str(),
                challenge.character,
                challenge.allows_drawing,
            ],
        )?;
        tx.commit()?;
        Ok(challenge)
    }

    fn delete_challenge(&self, challenge_id: &str) -> Result<bool, CatalogError> {
        let removed = self
            .conn()
            .execute("DELETE FROM challenges WHERE id = ?1", params![challenge_id])?;
        Ok(removed > 0)
    }
}

impl AdminPolicy for CatalogDb {
    fn is_admin(&self, user_id: &str) -> bool {
        let result = self
            .conn()
            .query_row(
                "SELECT is_admin FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get::<_, bool>(0),
            )
            .optional();
        match result {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "admin lookup failed");
                false
            }
        }
    }
}
