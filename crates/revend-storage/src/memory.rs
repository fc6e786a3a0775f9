use std::collections::HashMap;
use std::sync::Mutex;

use revend_core::{Result, RevendError};

use crate::store::SessionStore;

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| RevendError::Storage(format!("Memory store lock poisoned: {}", e)))?;
        Ok(f(&mut entries))
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, session_id: &str) -> Result<Option<String>> {
        self.with_entries(|entries| entries.get(session_id).cloned())
    }

    fn set(&self, session_id: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(session_id.to_string(), value.to_string());
        })
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        self.with_entries(|entries| entries.remove(session_id).is_some())
    }

    fn exists(&self, session_id: &str) -> Result<bool> {
        self.with_entries(|entries| entries.contains_key(session_id))
    }

    fn keys(&self) -> Result<Option<Vec<String>>> {
        self.with_entries(|entries| {
            let mut keys: Vec<String> = entries.keys().cloned().collect();
            keys.sort();
            Some(keys)
        })
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_overwrite() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);

        store.set("a", "{\"v\":1}").unwrap();
        store.set("a", "{\"v\":2}").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("{\"v\":2}"));
        assert!(store.exists("a").unwrap());
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.set("a", "{}").unwrap();
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert!(!store.exists("a").unwrap());
    }

    #[test]
    fn test_keys_sorted() {
        let store = MemoryStore::new();
        store.set("b", "{}").unwrap();
        store.set("a", "{}").unwrap();
        assert_eq!(
            store.keys().unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }
}
