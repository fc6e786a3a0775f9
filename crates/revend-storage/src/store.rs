use revend_core::Result;

/// Key-value store holding one JSON document per session id.
///
/// Writes are last-write-wins. Backends that cannot enumerate their keys
/// keep the default [`keys`](SessionStore::keys) and return `None`.
pub trait SessionStore: Send + Sync {
    fn get(&self, session_id: &str) -> Result<Option<String>>;

    /// Insert or replace the document for `session_id`.
    fn set(&self, session_id: &str, value: &str) -> Result<()>;

    /// Remove the document. Returns whether anything was removed.
    fn delete(&self, session_id: &str) -> Result<bool>;

    fn exists(&self, session_id: &str) -> Result<bool>;

    /// All stored session ids, when the backend can list them.
    fn keys(&self) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// Backend name used in logs.
    fn backend(&self) -> &'static str;
}
