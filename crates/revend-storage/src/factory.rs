use std::path::Path;
use std::sync::Arc;

use revend_core::config::StorageConfig;
use revend_core::Result;
use tracing::{info, warn};

use crate::memory::MemoryStore;
use crate::redis_store::RedisStore;
use crate::sqlite::SqliteStore;
use crate::store::SessionStore;

/// Supported session-store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Memory,
    Sqlite,
    Redis,
}

impl StorageType {
    /// Parse a configured backend name. Unknown names fall back to memory.
    pub fn from_config(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "memory" => StorageType::Memory,
            "sqlite" => StorageType::Sqlite,
            "redis" => StorageType::Redis,
            other => {
                warn!(storage_type = other, "Unknown storage type, falling back to memory");
                StorageType::Memory
            }
        }
    }
}

/// Build the configured session store.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match StorageType::from_config(&config.storage_type) {
        StorageType::Memory => Arc::new(MemoryStore::new()),
        StorageType::Sqlite => Arc::new(SqliteStore::open(Path::new(&config.sqlite_db_path))?),
        StorageType::Redis => Arc::new(RedisStore::open(&config.redis_url)?),
    };
    info!(backend = store.backend(), "Session store ready");
    Ok(store)
}
