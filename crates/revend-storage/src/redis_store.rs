//! Redis-backed session store.
//!
//! Each session is one string key `context:<session_id>` holding the JSON
//! document.

use std::sync::Mutex;

use redis::{Client, Commands, Connection};
use tracing::{info, warn};

use revend_core::{Result, RevendError};

use crate::store::SessionStore;

/// Prefix shared by every session key.
pub const KEY_PREFIX: &str = "context:";

/// Redis key for a session id.
pub fn session_key(session_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, session_id)
}

/// Session id of a Redis key, if it carries the session prefix.
pub fn session_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX)
}

fn storage_err(action: &str, err: redis::RedisError) -> RevendError {
    RevendError::Storage(format!("Redis {} failed: {}", action, err))
}

/// Store backed by a Redis server.
///
/// The connection is opened on first use. A command that fails drops it so
/// the next call reconnects.
pub struct RedisStore {
    client: Client,
    conn: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("server", &self.client.get_connection_info().addr.to_string())
            .finish()
    }
}

impl RedisStore {
    /// Parse the URL. No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| RevendError::Storage(format!("Invalid Redis URL: {}", e)))?;
        info!(server = %client.get_connection_info().addr, "Redis session store configured");
        Ok(Self {
            client,
            conn: Mutex::new(None),
        })
    }

    fn with_conn<F, T>(&self, action: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> redis::RedisResult<T>,
    {
        let mut guard = self
            .conn
            .lock()
            .map_err(|e| RevendError::Storage(format!("Redis connection lock poisoned: {}", e)))?;

        if guard.is_none() {
            let conn = self
                .client
                .get_connection()
                .map_err(|e| storage_err("connect", e))?;
            *guard = Some(conn);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(RevendError::Storage("Redis connection unavailable".to_string()));
        };

        match f(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    warn!(error = %e, "Dropping Redis connection");
                    *guard = None;
                }
                Err(storage_err(action, e))
            }
        }
    }
}

impl SessionStore for RedisStore {
    fn get(&self, session_id: &str) -> Result<Option<String>> {
        let key = session_key(session_id);
        self.with_conn("GET", |conn| conn.get(&key))
    }

    fn set(&self, session_id: &str, value: &str) -> Result<()> {
        let key = session_key(session_id);
        self.with_conn("SET", |conn| conn.set(&key, value))
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        let key = session_key(session_id);
        let removed: i64 = self.with_conn("DEL", |conn| conn.del(&key))?;
        Ok(removed > 0)
    }

    fn exists(&self, session_id: &str) -> Result<bool> {
        let key = session_key(session_id);
        self.with_conn("EXISTS", |conn| conn.exists(&key))
    }

    fn keys(&self) -> Result<Option<Vec<String>>> {
        let pattern = format!("{}*", KEY_PREFIX);
        let raw: Vec<String> = self.with_conn("SCAN", |conn| {
            Ok(conn.scan_match::<_, String>(&pattern)?.collect())
        })?;

        let mut ids: Vec<String> = raw
            .iter()
            .filter_map(|key| session_id_from_key(key))
            .map(str::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(Some(ids))
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
