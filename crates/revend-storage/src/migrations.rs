//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use revend_core::{Result, RevendError};

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| RevendError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| RevendError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: contexts");
    }

    Ok(())
}

/// Version 1: one JSON document per session.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS contexts (
            session_id  TEXT PRIMARY KEY,
            context     TEXT NOT NULL
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'contexts');",
    )
    .map_err(|e| RevendError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
