//! Session lifecycle on top of the session repository.

use std::collections::BTreeMap;

use revend_core::{ConversationContext, Interaction, Query, Response, Result, Session};
use revend_storage::SessionRepository;
use tracing::{debug, info};

/// Creates, reads and mutates sessions. Every mutation is a full
/// read-modify-write of the session document.
#[derive(Debug, Clone)]
pub struct SessionService {
    repository: SessionRepository,
}

impl SessionService {
    pub fn new(repository: SessionRepository) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    /// New active session with a generated id. Metadata entries are stored
    /// on the session context.
    pub fn create_session(
        &self,
        user_id: Option<String>,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<Session> {
        let mut session = Session::new(None, user_id);
        for (key, value) in metadata {
            session.context.set_metadata(key, value);
        }
        info!(session_id = %session.session_id, "Creating session");
        self.repository.create(session)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.repository.get(session_id)
    }

    /// The referenced session, or a fresh one when it does not resolve. The
    /// flag is `true` when a session was created.
    pub fn get_or_create(&self, session_id: Option<&str>) -> Result<(Session, bool)> {
        if let Some(id) = session_id {
            if let Some(session) = self.repository.get(id)? {
                return Ok((session, false));
            }
            debug!(session_id = %id, "Session not found, creating a new one");
        }
        Ok((self.create_session(None, BTreeMap::new())?, true))
    }

    /// Record a finished turn and fold its entities into the context.
    /// Returns `None` when the session does not exist.
    pub fn add_interaction(
        &self,
        session_id: &str,
        query: &Query,
        response: &Response,
    ) -> Result<Option<Session>> {
        let Some(mut session) = self.repository.get(session_id)? else {
            return Ok(None);
        };
        session.add_interaction(&query.query_text, &response.message, &query.entities);
        self.repository.update(session).map(Some)
    }

    /// Mark the session inactive. Returns `false` when it does not exist.
    pub fn deactivate_session(&self, session_id: &str) -> Result<bool> {
        let Some(mut session) = self.repository.get(session_id)? else {
            return Ok(false);
        };
        session.deactivate();
        self.repository.update(session)?;
        info!(session_id = %session_id, "Session deactivated");
        Ok(true)
    }

    /// Context of the session, empty when it does not exist.
    pub fn get_session_context(&self, session_id: &str) -> Result<ConversationContext> {
        Ok(self
            .repository
            .get(session_id)?
            .map(|s| s.context)
            .unwrap_or_default())
    }

    pub fn history(&self, session_id: &str) -> Result<Option<Vec<Interaction>>> {
        Ok(self.repository.get(session_id)?.map(|s| s.history))
    }
}
