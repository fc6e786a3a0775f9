//! Typed session persistence over a [`SessionStore`].

use std::sync::Arc;

use revend_core::{Result, Session};
use tracing::{debug, warn};

use crate::store::SessionStore;

/// Session CRUD over any [`SessionStore`].
///
/// Sessions are stored as their JSON serialization keyed by session id.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn get(&self, session_id: &str) -> Result<Option<Session>> {
        match self.store.get(session_id)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn create(&self, session: Session) -> Result<Session> {
        self.save(&session)?;
        debug!(session_id = %session.session_id, "Session created");
        Ok(session)
    }

    pub fn update(&self, session: Session) -> Result<Session> {
        self.save(&session)?;
        Ok(session)
    }

    /// Hard delete. Returns whether the session existed.
    pub fn delete(&self, session_id: &str) -> Result<bool> {
        if !self.store.exists(session_id)? {
            return Ok(false);
        }
        self.store.delete(session_id)
    }

    pub fn list_by_user(&self, user_id: &str) -> Result<Vec<Session>> {
        self.list_where(|s| s.user_id.as_deref() == Some(user_id))
    }

    pub fn list_active(&self) -> Result<Vec<Session>> {
        self.list_where(|s| s.active)
    }

    fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.store.set(&session.session_id, &json)
    }

    /// Empty when the store cannot enumerate its keys. Undecodable documents
    /// are skipped with a warning.
    fn list_where(&self, keep: impl Fn(&Session) -> bool) -> Result<Vec<Session>> {
        let Some(keys) = self.store.keys()? else {
            debug!(backend = self.store.backend(), "Store cannot list sessions");
            return Ok(Vec::new());
        };

        let mut sessions = Vec::new();
        for key in keys {
            match self.get(&key) {
                Ok(Some(session)) if keep(&session) => sessions.push(session),
                Ok(_) => {}
                Err(e) => warn!(session_id = %key, error = %e, "Skipping unreadable session"),
            }
        }
        Ok(sessions)
    }
}

impl std::fmt::Debug for SessionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRepository")
            .field("backend", &self.store.backend())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, SqliteStore};
    use revend_core::{EntityKey, EntityMap, RevendError};

    /// A store that cannot enumerate keys.
    struct OpaqueStore(MemoryStore);

    impl SessionStore for OpaqueStore {
        fn get(&self, id: &str) -> Result<Option<String>> {
            self.0.get(id)
        }
        fn set(&self, id: &str, value: &str) -> Result<()> {
            self.0.set(id, value)
        }
        fn delete(&self, id: &str) -> Result<bool> {
            self.0.delete(id)
        }
        fn exists(&self, id: &str) -> Result<bool> {
            self.0.exists(id)
        }
        fn backend(&self) -> &'static str {
            "opaque"
        }
    }

    fn repos() -> Vec<SessionRepository> {
        vec![
            SessionRepository::new(Arc::new(MemoryStore::new())),
            SessionRepository::new(Arc::new(SqliteStore::in_memory().unwrap())),
        ]
    }

    #[test]
    fn test_create_and_get_roundtrip() {
        for repo in repos() {
            let mut session = Session::new(None, Some("u1".to_string()));
            let mut entities = EntityMap::new();
            entities.insert(EntityKey::Distributor, "Officer");
            session.add_interaction("oi", "olá", &entities);

            let created = repo.create(session.clone()).unwrap();
            let loaded = repo.get(&created.session_id).unwrap().unwrap();
            assert_eq!(loaded, session);
        }
    }

    #[test]
    fn test_get_unknown_is_none() {
        for repo in repos() {
            assert!(repo.get("missing").unwrap().is_none());
        }
    }

    #[test]
    fn test_update_overwrites() {
        for repo in repos() {
            let session = repo.create(Session::new(None, None)).unwrap();
            let mut changed = session.clone();
            changed.deactivate();
            repo.update(changed).unwrap();
            assert!(!repo.get(&session.session_id).unwrap().unwrap().active);
        }
    }

    #[test]
    fn test_delete() {
        for repo in repos() {
            let session = repo.create(Session::new(None, None)).unwrap();
            assert!(repo.delete(&session.session_id).unwrap());
            assert!(!repo.delete(&session.session_id).unwrap());
            assert!(repo.get(&session.session_id).unwrap().is_none());
        }
    }

    #[test]
    fn test_list_by_user_and_active() {
        for repo in repos() {
            repo.create(Session::new(Some("a".into()), Some("ana".into()))).unwrap();
            repo.create(Session::new(Some("b".into()), Some("bia".into()))).unwrap();
            let mut inactive = Session::new(Some("c".into()), Some("ana".into()));
            inactive.deactivate();
            repo.create(inactive).unwrap();

            let ana: Vec<String> = repo
                .list_by_user("ana")
                .unwrap()
                .into_iter()
                .map(|s| s.session_id)
                .collect();
            assert_eq!(ana, vec!["a", "c"]);

            let active: Vec<String> = repo
                .list_active()
                .unwrap()
                .into_iter()
                .map(|s| s.session_id)
                .collect();
            assert_eq!(active, vec!["a", "b"]);
        }
    }

    #[test]
    fn test_listing_without_key_enumeration_is_empty() {
        let repo = SessionRepository::new(Arc::new(OpaqueStore(MemoryStore::new())));
        repo.create(Session::new(None, Some("ana".into()))).unwrap();
        assert!(repo.list_by_user("ana").unwrap().is_empty());
        assert!(repo.list_active().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_document_is_an_error_on_get() {
        let store = Arc::new(MemoryStore::new());
        store.set("bad", "not json").unwrap();
        let repo = SessionRepository::new(store);
        assert!(matches!(repo.get("bad"), Err(RevendError::Serialization(_))));
        // Listing skips it instead of failing.
        assert!(repo.list_active().unwrap().is_empty());
    }
}
