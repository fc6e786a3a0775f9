//! Resolution orchestrator: runs one conversation turn end to end.
//!
//! extract -> merge with session context -> gate/validate -> compose reply
//! -> append to history. Unexpected failures become an error outcome and
//! are still recorded on the session when possible.

use std::sync::Arc;

use chrono::Utc;
use revend_core::{generate_session_id, EntityMap, Query, Response, RevendError};
use revend_nlp::EntityExtractor;
use tracing::{debug, error, info};

use crate::context::merge_context;
use crate::error::ChatError;
use crate::response::compose;
use crate::session::SessionService;
use crate::validator::{evaluate, TurnOutcome};

/// Default maximum query length in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 2000;

/// Everything produced by one turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Session the turn was recorded on. Differs from the requested id when
    /// a new session had to be created.
    pub session_id: String,
    pub query: Query,
    pub response: Response,
    pub outcome: TurnOutcome,
}

/// Coordinates extraction, context merge, validation and history.
pub struct ResolutionOrchestrator {
    extractor: Arc<dyn EntityExtractor>,
    sessions: SessionService,
    max_query_length: usize,
}

impl ResolutionOrchestrator {
    pub fn new(extractor: Arc<dyn EntityExtractor>, sessions: SessionService) -> Self {
        Self {
            extractor,
            sessions,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
        }
    }

    pub fn with_max_query_length(mut self, max: usize) -> Self {
        self.max_query_length = max;
        self
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    /// Process one customer message.
    ///
    /// Only malformed input is returned as `Err`. Any failure while
    /// processing yields `Ok` with an error outcome.
    pub async fn process_query(
        &self,
        session_id: Option<&str>,
        query_text: &str,
    ) -> Result<TurnResult, ChatError> {
        if query_text.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }
        if query_text.chars().count() > self.max_query_length {
            return Err(ChatError::QueryTooLong(self.max_query_length));
        }

        // Every outcome carries a session id, even when no session could be
        // loaded or created.
        let mut active_session = session_id
            .map(str::to_string)
            .unwrap_or_else(generate_session_id);
        match self.resolve_turn(session_id, &mut active_session, query_text).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(error = %e, "Failed to process query");
                Ok(self.error_turn(active_session, query_text, e))
            }
        }
    }

    async fn resolve_turn(
        &self,
        requested: Option<&str>,
        active_session: &mut String,
        query_text: &str,
    ) -> Result<TurnResult, RevendError> {
        let (session, created) = self.sessions.get_or_create(requested)?;
        if created {
            info!(session_id = %session.session_id, "Started new session for query");
        }
        active_session.clone_from(&session.session_id);

        let entities = self.extract(query_text).await?;
        let mut query = Query::new(&session.session_id, query_text).with_entities(entities);
        let filled = merge_context(&mut query, &session.context);

        let outcome = evaluate(&query.entities);
        debug!(
            session_id = %session.session_id,
            filled_from_context = filled.len(),
            outcome = ?outcome,
            "Turn classified"
        );

        let response = compose(&outcome, &query.entities, Utc::now());
        self.sessions
            .add_interaction(&session.session_id, &query, &response)?;

        Ok(TurnResult {
            session_id: session.session_id,
            query,
            response,
            outcome,
        })
    }

    /// Extraction runs CPU-bound model inference, so it is moved off the
    /// async worker.
    async fn extract(&self, text: &str) -> Result<EntityMap, RevendError> {
        let extractor = Arc::clone(&self.extractor);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || extractor.extract(&text))
            .await
            .map_err(|e| RevendError::Inference(format!("Extraction task panicked: {}", e)))?
    }

    /// Recording the failed turn is best-effort. A session that was never
    /// stored is left alone.
    fn error_turn(&self, session_id: String, query_text: &str, err: RevendError) -> TurnResult {
        let outcome = TurnOutcome::Error {
            message: err.to_string(),
        };
        let query = Query::new(&session_id, query_text);
        let response = compose(&outcome, &query.entities, Utc::now());

        if let Err(history_err) = self.sessions.add_interaction(&session_id, &query, &response) {
            error!(
                session_id = %session_id,
                error = %history_err,
                "Failed to record failed turn in session history"
            );
        }

        TurnResult {
            session_id,
            query,
            response,
            outcome,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use revend_core::{EntityKey, ResponseStatus, Result as CoreResult};
    use revend_nlp::{HeuristicExtractor, ModelBackedExtractor, NerPipeline, NerSpan};
    use revend_storage::{MemoryStore, SessionRepository, SessionStore};

    fn orchestrator_with(extractor: Arc<dyn EntityExtractor>) -> ResolutionOrchestrator {
        let repo = SessionRepository::new(Arc::new(MemoryStore::new()));
        ResolutionOrchestrator::new(extractor, SessionService::new(repo))
    }

    fn orchestrator() -> ResolutionOrchestrator {
        orchestrator_with(Arc::new(HeuristicExtractor::new()))
    }

    struct FailingExtractor;

    impl EntityExtractor for FailingExtractor {
        fn name(&self) -> &str {
            "failing"
        }

        fn extract(&self, _text: &str) -> CoreResult<EntityMap> {
            Err(RevendError::Inference("model exploded".to_string()))
        }
    }

    /// Store whose writes can be switched off.
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
    }

    impl SessionStore for FlakyStore {
        fn get(&self, id: &str) -> CoreResult<Option<String>> {
            self.inner.get(id)
        }
        fn set(&self, id: &str, value: &str) -> CoreResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(RevendError::Storage("write refused".to_string()));
            }
            self.inner.set(id, value)
        }
        fn delete(&self, id: &str) -> CoreResult<bool> {
            self.inner.delete(id)
        }
        fn exists(&self, id: &str) -> CoreResult<bool> {
            self.inner.exists(id)
        }
        fn backend(&self) -> &'static str {
            "flaky"
        }
    }

    struct FailFirstPipeline {
        calls: AtomicUsize,
    }

    impl NerPipeline for FailFirstPipeline {
        fn run(&self, _text: &str) -> CoreResult<Vec<NerSpan>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RevendError::Inference("first call fails".to_string()));
            }
            Ok(vec![NerSpan::new("Golden", "DISTRIBUIDOR", 0, 6)])
        }
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized_queries() {
        let orch = orchestrator().with_max_query_length(10);
        assert!(matches!(
            orch.process_query(None, "   ").await,
            Err(ChatError::EmptyQuery)
        ));
        assert!(matches!(
            orch.process_query(None, "pedido 12345678").await,
            Err(ChatError::QueryTooLong(10))
        ));
    }

    #[tokio::test]
    async fn test_resolved_turn() {
        let orch = orchestrator();
        let result = orch
            .process_query(None, "Qual o status do pedido 112233 da Officer?")
            .await
            .unwrap();

        assert_eq!(result.outcome, TurnOutcome::Resolved);
        assert_eq!(result.response.status, ResponseStatus::Resolved);
        assert!(result.response.message.contains("112233"));
        assert!(result.response.message.contains("Officer"));
        assert!(result.response.data.is_some());

        let history = orch.sessions().history(&result.session_id).unwrap().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].response, result.response.message);
    }

    #[tokio::test]
    async fn test_unsupported_distributor() {
        let orch = orchestrator();
        let result = orch
            .process_query(None, "pedido 999 da alcateia")
            .await
            .unwrap();
        assert!(result.outcome.is_unsupported());
        assert_eq!(result.response.status, ResponseStatus::Resolved);
        assert_eq!(result.response.distributor.as_deref(), Some("alcateia"));
        assert_eq!(result.response.order_number.as_deref(), Some("999"));
    }

    #[tokio::test]
    async fn test_missing_everything() {
        let orch = orchestrator();
        let result = orch.process_query(None, "Olá, bom dia").await.unwrap();
        assert_eq!(result.response.status, ResponseStatus::MissingInfo);
        assert_eq!(
            result.response.missing_fields,
            Some(vec![
                EntityKey::Distributor,
                EntityKey::OrderNumber,
                EntityKey::InvoiceNumber
            ])
        );
    }

    #[tokio::test]
    async fn test_context_carries_across_turns() {
        let orch = orchestrator();
        let first = orch.process_query(None, "É da Ingram").await.unwrap();
        assert_eq!(first.response.status, ResponseStatus::MissingInfo);

        let second = orch
            .process_query(Some(&first.session_id), "pedido 4455")
            .await
            .unwrap();
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.outcome, TurnOutcome::Resolved);
        assert_eq!(second.query.distributor(), Some("Ingram"));

        let ctx = orch.sessions().get_session_context(&first.session_id).unwrap();
        assert_eq!(ctx.entities.distributor(), Some("Ingram"));
        assert_eq!(ctx.entities.order_number(), Some("4455"));
    }

    #[tokio::test]
    async fn test_new_value_replaces_context_value() {
        let orch = orchestrator();
        let first = orch.process_query(None, "pedido 1 da alcateia").await.unwrap();
        assert!(first.outcome.is_unsupported());

        // The unsupported distributor stays in context until another is named.
        let second = orch
            .process_query(Some(&first.session_id), "e o pedido 2?")
            .await
            .unwrap();
        assert!(second.outcome.is_unsupported());

        let third = orch
            .process_query(Some(&first.session_id), "desculpe, é da Golden")
            .await
            .unwrap();
        assert_eq!(third.outcome, TurnOutcome::Resolved);
        assert_eq!(third.query.order_number(), Some("2"));
    }

    #[tokio::test]
    async fn test_unknown_session_id_starts_new_session() {
        let orch = orchestrator();
        let result = orch
            .process_query(Some("does-not-exist"), "nf 10 golden")
            .await
            .unwrap();
        assert_ne!(result.session_id, "does-not-exist");
        assert!(orch.sessions().get_session(&result.session_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_extraction_failure_is_error_outcome_with_history() {
        let orch = orchestrator_with(Arc::new(FailingExtractor));
        let result = orch.process_query(None, "pedido 1 officer").await.unwrap();

        assert_eq!(result.response.status, ResponseStatus::Error);
        assert!(result.response.message.starts_with("Ocorreu um erro ao processar sua consulta:"));
        assert!(result.response.error.as_deref().unwrap().contains("model exploded"));

        let history = orch.sessions().history(&result.session_id).unwrap().unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].entities.is_empty());
    }

    #[tokio::test]
    async fn test_history_failure_is_swallowed() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_writes: AtomicBool::new(false),
        });
        let repo = SessionRepository::new(store.clone());
        let orch = ResolutionOrchestrator::new(
            Arc::new(HeuristicExtractor::new()),
            SessionService::new(repo),
        );
        let first = orch.process_query(None, "oi").await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let result = orch
            .process_query(Some(&first.session_id), "pedido 5 officer")
            .await
            .unwrap();
        assert_eq!(result.response.status, ResponseStatus::Error);
        assert_eq!(result.session_id, first.session_id);
        assert!(result.response.error.as_deref().unwrap().contains("write refused"));
    }

    /// Store that refuses every write.
    struct ReadOnlyStore;

    impl SessionStore for ReadOnlyStore {
        fn get(&self, _id: &str) -> CoreResult<Option<String>> {
            Ok(None)
        }
        fn set(&self, _id: &str, _value: &str) -> CoreResult<()> {
            Err(RevendError::Storage("disk full".to_string()))
        }
        fn delete(&self, _id: &str) -> CoreResult<bool> {
            Ok(false)
        }
        fn exists(&self, _id: &str) -> CoreResult<bool> {
            Ok(false)
        }
        fn backend(&self) -> &'static str {
            "read-only"
        }
    }

    #[tokio::test]
    async fn test_failed_session_creation_still_returns_session_id() {
        let repo = SessionRepository::new(Arc::new(ReadOnlyStore));
        let orch = ResolutionOrchestrator::new(
            Arc::new(HeuristicExtractor::new()),
            SessionService::new(repo),
        );

        let result = orch.process_query(None, "pedido 1 officer").await.unwrap();
        assert_eq!(result.response.status, ResponseStatus::Error);
        assert!(!result.session_id.is_empty());
        assert_eq!(result.query.session_id, result.session_id);

        let result = orch
            .process_query(Some("caller-id"), "pedido 1 officer")
            .await
            .unwrap();
        assert_eq!(result.response.status, ResponseStatus::Error);
        assert_eq!(result.session_id, "caller-id");
    }

    #[tokio::test]
    async fn test_inference_failure_degrades_to_heuristics() {
        let pipeline = Arc::new(FailFirstPipeline {
            calls: AtomicUsize::new(0),
        });
        let extractor = Arc::new(ModelBackedExtractor::with_primary(pipeline.clone()));
        let orch = orchestrator_with(extractor);

        let first = orch.process_query(None, "pedido 8 da Officer").await.unwrap();
        assert_eq!(first.response.status, ResponseStatus::Resolved);
        assert_eq!(first.query.distributor(), Some("Officer"));

        let second = orch
            .process_query(Some(&first.session_id), "alguma novidade?")
            .await
            .unwrap();
        assert_eq!(second.query.distributor(), Some("Golden"));
        assert_eq!(pipeline.calls.load(Ordering::SeqCst), 2);
    }
}
