//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path parameters and JSON bodies via axum
//! extractors, calls into the resolution layer, and returns JSON responses.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use revend_chat::{ChatError, TurnResult};
use revend_core::{EntityKey, Interaction, ResponseStatus, Session};

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub session_id: Option<String>,
    pub query: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionRequest {
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub session_id: String,
    pub query: String,
    pub response: String,
    pub status: ResponseStatus,
    /// Finer-grained than `status`: unsupported distributors are reported
    /// as `unsupported` here while `status` stays `resolved`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<EntityKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<TurnResult> for QueryResponse {
    fn from(turn: TurnResult) -> Self {
        let response = turn.response;
        Self {
            session_id: turn.session_id,
            query: turn.query.query_text,
            response: response.message,
            status: response.status,
            outcome: turn.outcome.as_str().to_string(),
            distributor: response.distributor,
            order_number: response.order_number,
            invoice_number: response.invoice_number,
            missing_fields: response.missing_fields,
            error: response.error,
            data: response.data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
    /// Bearer token, only present on creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl SessionResponse {
    fn from_session(session: &Session, token: Option<String>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user_id: session.user_id.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            active: session.active,
            token,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeactivateResponse {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub interactions: Vec<Interaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub extractor: String,
    pub storage: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
    pub docs: String,
    pub health: String,
}

fn session_not_found(session_id: &str) -> ApiError {
    ChatError::SessionNotFound(session_id.to_string()).into()
}

// =============================================================================
// Handlers
// =============================================================================

/// GET / - Welcome payload with links.
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Bem-vindo à API Revend LLM".to_string(),
        docs: "/docs".to_string(),
        health: "/health".to_string(),
    })
}

/// GET /health - Liveness check.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        extractor: state.extractor_mode.to_string(),
        storage: state
            .orchestrator
            .sessions()
            .repository()
            .store()
            .backend()
            .to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// POST /api/query - Process one customer message.
///
/// The session comes from the body's `session_id`, or from a bearer token
/// when the body has none. Tokens that do not resolve are ignored.
pub async fn process_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let session_id = match request.session_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => Some(id),
        None => bearer_token(&headers).and_then(|token| {
            let resolved = state.tokens.resolve(token);
            if resolved.is_none() {
                debug!("Ignoring unknown or expired session token");
            }
            resolved
        }),
    };

    let turn = state
        .orchestrator
        .process_query(session_id.as_deref(), &request.query)
        .await?;

    Ok(Json(QueryResponse::from(turn)))
}

/// POST /api/sessions - Create a session and issue its token.
///
/// The body is optional; an empty body creates an anonymous session.
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let request: SessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid session request: {}", e)))?
    };
    let session = state
        .orchestrator
        .sessions()
        .create_session(request.user_id, request.metadata)?;
    let token = state.tokens.issue(&session.session_id)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::from_session(&session, Some(token))),
    ))
}

/// GET /api/sessions/{id} - Session summary.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .orchestrator
        .sessions()
        .get_session(&session_id)?
        .ok_or_else(|| session_not_found(&session_id))?;

    Ok(Json(SessionResponse::from_session(&session, None)))
}

/// DELETE /api/sessions/{id} - Deactivate a session and revoke its tokens.
pub async fn deactivate_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<DeactivateResponse>, ApiError> {
    if !state.orchestrator.sessions().deactivate_session(&session_id)? {
        return Err(session_not_found(&session_id));
    }
    let revoked = state.tokens.revoke_session(&session_id);
    info!(session_id = %session_id, revoked, "Session closed");

    Ok(Json(DeactivateResponse {
        message: "Sessão desativada com sucesso".to_string(),
        session_id,
    }))
}

/// GET /api/sessions/{id}/history - Ordered interactions of a session.
pub async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let interactions = state
        .orchestrator
        .sessions()
        .history(&session_id)?
        .ok_or_else(|| session_not_found(&session_id))?;

    Ok(Json(HistoryResponse {
        session_id,
        interactions,
    }))
}
