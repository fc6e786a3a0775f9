//! Session tokens.
//!
//! A token is handed out when a session is created and can stand in for the
//! session id on `/api/query` via `Authorization: Bearer <token>`. Only a
//! SHA-256 hash of each token is kept in memory.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use revend_core::config::AuthConfig;
use revend_core::{Result, RevendError};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Generate a random 64-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Clone)]
struct TokenEntry {
    session_id: String,
    expires_at: DateTime<Utc>,
}

/// In-memory registry of issued session tokens, keyed by token hash.
#[derive(Debug)]
pub struct TokenRegistry {
    secret: String,
    ttl: Duration,
    entries: Mutex<HashMap<String, TokenEntry>>,
}

impl TokenRegistry {
    pub fn new(secret: impl Into<String>, ttl_minutes: u32) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::minutes(i64::from(ttl_minutes)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.secret_key.clone(), config.token_ttl_minutes)
    }

    /// Keyed SHA-256 of a token, hex-encoded.
    fn hash_token(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Issue a new token for `session_id`. Expired entries are swept first.
    pub fn issue(&self, session_id: &str) -> Result<String> {
        let token = generate_token();
        let now = Utc::now();
        let entry = TokenEntry {
            session_id: session_id.to_string(),
            expires_at: now + self.ttl,
        };
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| RevendError::Auth(format!("Token registry lock poisoned: {}", e)))?;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        if entries.len() < before {
            debug!(swept = before - entries.len(), "Dropped expired session tokens");
        }
        entries.insert(self.hash_token(&token), entry);
        Ok(token)
    }

    /// Session the token was issued for. Unknown and expired tokens resolve
    /// to `None`; expired entries are dropped.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let hash = self.hash_token(token);
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(&hash)?;
        if entry.expires_at <= Utc::now() {
            debug!(session_id = %entry.session_id, "Session token expired");
            entries.remove(&hash);
            return None;
        }
        Some(entry.session_id.clone())
    }

    /// Drop every token issued for `session_id`. Returns how many were removed.
    pub fn revoke_session(&self, session_id: &str) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.session_id != session_id);
        before - entries.len()
    }
}
