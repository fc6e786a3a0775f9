//! Distributor gate and completeness check.

use revend_core::{is_supported_distributor, EntityKey, EntityMap, ResponseStatus};

/// How a turn was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A distributor we do not work with was named.
    Unsupported { distributor: String },
    /// Not enough information to answer.
    MissingInfo { missing: Vec<EntityKey> },
    /// Distributor plus an order or invoice number are known.
    Resolved,
    /// Processing failed unexpectedly.
    Error { message: String },
}

impl TurnOutcome {
    /// Status reported to callers. Declining an unsupported distributor is a
    /// successful answer on the wire.
    pub fn status(&self) -> ResponseStatus {
        match self {
            TurnOutcome::Unsupported { .. } | TurnOutcome::Resolved => ResponseStatus::Resolved,
            TurnOutcome::MissingInfo { .. } => ResponseStatus::MissingInfo,
            TurnOutcome::Error { .. } => ResponseStatus::Error,
        }
    }

    /// Outcome name, distinct for every variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Unsupported { .. } => "unsupported",
            TurnOutcome::MissingInfo { .. } => "missing_info",
            TurnOutcome::Resolved => "resolved",
            TurnOutcome::Error { .. } => "error",
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, TurnOutcome::Unsupported { .. })
    }
}

/// Fields that keep a turn from being answered: the distributor when absent,
/// and both numbers when neither is known.
pub fn missing_fields(entities: &EntityMap) -> Vec<EntityKey> {
    let mut missing = Vec::new();
    if entities.distributor().is_none() {
        missing.push(EntityKey::Distributor);
    }
    if entities.order_number().is_none() && entities.invoice_number().is_none() {
        missing.push(EntityKey::OrderNumber);
        missing.push(EntityKey::InvoiceNumber);
    }
    missing
}

/// Classify a turn's merged entities. The first matching rule wins:
/// unsupported distributor, then missing information, then resolved.
pub fn evaluate(entities: &EntityMap) -> TurnOutcome {
    if let Some(distributor) = entities.distributor() {
        if !is_supported_distributor(distributor) {
            return TurnOutcome::Unsupported {
                distributor: distributor.to_string(),
            };
        }
    }

    let missing = missing_fields(entities);
    if !missing.is_empty() {
        return TurnOutcome::MissingInfo { missing };
    }

    TurnOutcome::Resolved
}
