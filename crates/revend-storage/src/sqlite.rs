use std::path::Path;
use std::sync::Arc;

use rusqlite::OptionalExtension;

use revend_core::{Result, RevendError};

use crate::db::Database;
use crate::store::SessionStore;

/// Store backed by the `contexts` table.
#[derive(Debug)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Arc::new(Database::new(path)?)))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }
}

impl SessionStore for SqliteStore {
    fn get(&self, session_id: &str) -> Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT context FROM contexts WHERE session_id = ?1",
                rusqlite::params![session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RevendError::Storage(format!("Failed to read session: {}", e)))
        })
    }

    fn set(&self, session_id: &str, value: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO contexts (session_id, context) VALUES (?1, ?2)",
                rusqlite::params![session_id, value],
            )
            .map_err(|e| RevendError::Storage(format!("Failed to save session: {}", e)))?;
            Ok(())
        })
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        self.db.with_conn(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM contexts WHERE session_id = ?1",
                    rusqlite::params![session_id],
                )
                .map_err(|e| RevendError::Storage(format!("Failed to delete session: {}", e)))?;
            Ok(removed > 0)
        })
    }

    fn exists(&self, session_id: &str) -> Result<bool> {
        self.db.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM contexts WHERE session_id = ?1",
                    rusqlite::params![session_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| RevendError::Storage(e.to_string()))?;
            Ok(found.is_some())
        })
    }

    fn keys(&self) -> Result<Option<Vec<String>>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT session_id FROM contexts ORDER BY session_id")
                .map_err(|e| RevendError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| RevendError::Storage(e.to_string()))?;

            let mut keys = Vec::new();
            for row in rows {
                keys.push(row.map_err(|e| RevendError::Storage(e.to_string()))?);
            }
            Ok(Some(keys))
        })
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
