use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Distributors
// =============================================================================

/// Distributors whose orders and invoices can be looked up.
pub const SUPPORTED_DISTRIBUTORS: [&str; 3] = ["officer", "ingram", "golden"];

/// Distributors we recognise in text but do not work with.
pub const UNSUPPORTED_DISTRIBUTORS: [&str; 3] = ["alcateia", "network1", "n1"];

/// Case-insensitive membership test against [`SUPPORTED_DISTRIBUTORS`].
pub fn is_supported_distributor(name: &str) -> bool {
    let name = name.trim();
    SUPPORTED_DISTRIBUTORS
        .iter()
        .any(|d| d.eq_ignore_ascii_case(name))
}

// =============================================================================
// Entities
// =============================================================================

/// The fixed set of facts extracted from a customer message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKey {
    Distributor,
    OrderNumber,
    InvoiceNumber,
}

impl EntityKey {
    pub const ALL: [EntityKey; 3] = [
        EntityKey::Distributor,
        EntityKey::OrderNumber,
        EntityKey::InvoiceNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKey::Distributor => "distributor",
            EntityKey::OrderNumber => "order_number",
            EntityKey::InvoiceNumber => "invoice_number",
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity values keyed by [`EntityKey`]. Absent keys mean "unknown".
///
/// Values keep the casing and spacing the user typed. Empty values are never
/// stored, so presence always implies textual evidence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityMap(BTreeMap<EntityKey, String>);

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: EntityKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    /// Store `value` under `key`. Returns `false` (and stores nothing) for
    /// blank values.
    pub fn insert(&mut self, key: EntityKey, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.trim().is_empty() {
            return false;
        }
        self.0.insert(key, value);
        true
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn distributor(&self) -> Option<&str> {
        self.get(EntityKey::Distributor)
    }

    pub fn order_number(&self) -> Option<&str> {
        self.get(EntityKey::OrderNumber)
    }

    pub fn invoice_number(&self) -> Option<&str> {
        self.get(EntityKey::InvoiceNumber)
    }
}

impl FromIterator<(EntityKey, String)> for EntityMap {
    fn from_iter<I: IntoIterator<Item = (EntityKey, String)>>(iter: I) -> Self {
        let mut map = EntityMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Facts accumulated over a conversation, plus caller-supplied metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default)]
    pub entities: EntityMap,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ConversationContext {
    /// Overwrite context entries with every value present in `entities`.
    /// Keys missing from `entities` are left untouched.
    pub fn absorb(&mut self, entities: &EntityMap) {
        for (key, value) in entities.iter() {
            self.entities.insert(key, value);
        }
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }
}

/// One completed turn, as recorded in session history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub query: String,
    pub response: String,
    pub entities: EntityMap,
    pub timestamp: DateTime<Utc>,
}

/// A conversation with one customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
    #[serde(default)]
    pub context: ConversationContext,
    #[serde(default)]
    pub history: Vec<Interaction>,
}

impl Session {
    /// New active session. A fresh UUID is generated when `session_id` is `None`.
    pub fn new(session_id: Option<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.unwrap_or_else(generate_session_id),
            user_id,
            created_at: now,
            updated_at: now,
            active: true,
            context: ConversationContext::default(),
            history: Vec::new(),
        }
    }

    /// Append a turn to history, then fold its entities into the context.
    pub fn add_interaction(&mut self, query: &str, response: &str, entities: &EntityMap) {
        let now = Utc::now();
        self.history.push(Interaction {
            query: query.to_string(),
            response: response.to_string(),
            entities: entities.clone(),
            timestamp: now,
        });
        self.context.absorb(entities);
        self.updated_at = now;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Turns
// =============================================================================

/// One customer message and the entities known for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub session_id: String,
    pub query_text: String,
    #[serde(default)]
    pub entities: EntityMap,
}

impl Query {
    pub fn new(session_id: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query_text: query_text.into(),
            entities: EntityMap::new(),
        }
    }

    pub fn with_entities(mut self, entities: EntityMap) -> Self {
        self.entities = entities;
        self
    }

    pub fn distributor(&self) -> Option<&str> {
        self.entities.distributor()
    }

    pub fn order_number(&self) -> Option<&str> {
        self.entities.order_number()
    }

    pub fn invoice_number(&self) -> Option<&str> {
        self.entities.invoice_number()
    }
}

/// Wire-level status of a [`Response`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Resolved,
    MissingInfo,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Resolved => "resolved",
            ResponseStatus::MissingInfo => "missing_info",
            ResponseStatus::Error => "error",
        }
    }
}

/// The answer to one turn. Built once, never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: ResponseStatus,
    pub message: String,
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

impl Response {
    fn base(status: ResponseStatus, message: String, entities: &EntityMap) -> Self {
        Self {
            status,
            message,
            distributor: entities.distributor().map(str::to_string),
            order_number: entities.order_number().map(str::to_string),
            invoice_number: entities.invoice_number().map(str::to_string),
            missing_fields: None,
            error: None,
            data: None,
        }
    }

    pub fn resolved(
        message: impl Into<String>,
        entities: &EntityMap,
        data: Option<serde_json::Value>,
    ) -> Self {
        let mut response = Self::base(ResponseStatus::Resolved, message.into(), entities);
        response.data = data;
        response
    }

    pub fn missing_info(
        message: impl Into<String>,
        entities: &EntityMap,
        missing: Vec<EntityKey>,
    ) -> Self {
        let mut response = Self::base(ResponseStatus::MissingInfo, message.into(), entities);
        response.missing_fields = Some(missing);
        response
    }

    pub fn error(message: impl Into<String>, error: impl Into<String>) -> Self {
        let mut response = Self::base(ResponseStatus::Error, message.into(), &EntityMap::new());
        response.error = Some(error.into());
        response
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entities(pairs: &[(EntityKey, &str)]) -> EntityMap {
        pairs
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect()
    }

    #[test]
    fn test_supported_distributor_is_case_insensitive() {
        assert!(is_supported_distributor("Officer"));
        assert!(is_supported_distributor("INGRAM"));
        assert!(is_supported_distributor(" golden "));
        assert!(!is_supported_distributor("alcateia"));
        assert!(!is_supported_distributor(""));
    }

    #[test]
    fn test_entity_key_serde_names() {
        let json = serde_json::to_string(&EntityKey::OrderNumber).unwrap();
        assert_eq!(json, "\"order_number\"");
        for key in EntityKey::ALL {
            assert_eq!(
                serde_json::to_string(&key).unwrap(),
                format!("\"{}\"", key.as_str())
            );
        }
    }

    #[test]
    fn test_entity_map_ignores_blank_values() {
        let mut map = EntityMap::new();
        assert!(!map.insert(EntityKey::Distributor, ""));
        assert!(!map.insert(EntityKey::Distributor, "   "));
        assert!(map.is_empty());
        assert!(map.insert(EntityKey::Distributor, "Officer"));
        assert_eq!(map.distributor(), Some("Officer"));
    }

    #[test]
    fn test_entity_map_serializes_as_plain_object() {
        let map = entities(&[
            (EntityKey::Distributor, "Ingram"),
            (EntityKey::OrderNumber, "42"),
        ]);
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"distributor": "Ingram", "order_number": "42"})
        );
        let back: EntityMap = serde_json::from_value(value).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_context_absorb_never_erases() {
        let mut ctx = ConversationContext::default();
        ctx.absorb(&entities(&[(EntityKey::Distributor, "Officer")]));
        ctx.absorb(&entities(&[(EntityKey::OrderNumber, "123")]));
        assert_eq!(ctx.entities.distributor(), Some("Officer"));
        assert_eq!(ctx.entities.order_number(), Some("123"));

        ctx.absorb(&entities(&[(EntityKey::Distributor, "Golden")]));
        assert_eq!(ctx.entities.distributor(), Some("Golden"));
        assert_eq!(ctx.entities.order_number(), Some("123"));
    }

    #[test]
    fn test_session_new_generates_id() {
        let a = Session::new(None, None);
        let b = Session::new(None, Some("user-1".to_string()));
        assert_ne!(a.session_id, b.session_id);
        assert!(Uuid::parse_str(&a.session_id).is_ok());
        assert!(a.active);
        assert_eq!(b.user_id.as_deref(), Some("user-1"));

        let c = Session::new(Some("fixed".to_string()), None);
        assert_eq!(c.session_id, "fixed");
    }

    #[test]
    fn test_session_add_interaction_updates_context() {
        let mut session = Session::new(None, None);
        let turn = entities(&[(EntityKey::InvoiceNumber, "555")]);
        session.add_interaction("nf 555", "Qual o distribuidor?", &turn);

        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].query, "nf 555");
        assert_eq!(session.history[0].entities, turn);
        assert_eq!(session.context.entities.invoice_number(), Some("555"));
        assert!(session.updated_at >= session.created_at);
    }

    #[test]
    fn test_session_deactivate() {
        let mut session = Session::new(None, None);
        session.deactivate();
        assert!(!session.active);
    }

    #[test]
    fn test_session_json_roundtrip_keeps_metadata() {
        let mut session = Session::new(Some("s-1".to_string()), None);
        session
            .context
            .set_metadata("channel", serde_json::json!("whatsapp"));
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_response_skips_absent_fields() {
        let response = Response::missing_info(
            "Preciso do distribuidor.",
            &entities(&[(EntityKey::OrderNumber, "77")]),
            vec![EntityKey::Distributor],
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "missing_info");
        assert_eq!(value["order_number"], "77");
        assert_eq!(value["missing_fields"], serde_json::json!(["distributor"]));
        assert!(value.get("distributor").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_response_error_carries_description() {
        let response = Response::error("Ocorreu um erro", "boom");
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert!(response.distributor.is_none());
    }
}
