//! Revend Storage crate - pluggable session store and session repository.
//!
//! Sessions are persisted as JSON documents in a key-value [`SessionStore`].
//! Three backends ship: an in-process map, a SQLite table and a Redis
//! server. The [`SessionRepository`] layers typed session CRUD on top of
//! any of them.

pub mod db;
pub mod factory;
pub mod memory;
pub mod migrations;
pub mod redis_store;
pub mod repository;
pub mod sqlite;
pub mod store;

pub use db::Database;
pub use factory::{open_store, StorageType};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use repository::SessionRepository;
pub use sqlite::SqliteStore;
pub use store::SessionStore;
