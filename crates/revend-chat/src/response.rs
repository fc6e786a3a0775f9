//! Reply text and payload for each turn outcome.

use chrono::{DateTime, SecondsFormat, Utc};
use revend_core::{EntityKey, EntityMap, Response};

use crate::validator::TurnOutcome;

/// Customer-facing name of a field.
fn field_label(key: EntityKey) -> &'static str {
    match key {
        EntityKey::Distributor => "distribuidor",
        EntityKey::OrderNumber => "número do pedido",
        EntityKey::InvoiceNumber => "número da nota fiscal",
    }
}

pub fn unsupported_message(distributor: &str) -> String {
    format!(
        "Desculpe, atualmente não trabalhamos com o distribuidor {}. \
         Os distribuidores suportados são: Officer, Ingram e Golden.",
        distributor
    )
}

/// Ask for the missing fields. Order and invoice are alternatives, so they
/// are joined with "ou".
pub fn missing_info_message(missing: &[EntityKey]) -> String {
    let needs_distributor = missing.contains(&EntityKey::Distributor);
    let needs_number =
        missing.contains(&EntityKey::OrderNumber) || missing.contains(&EntityKey::InvoiceNumber);

    let mut parts = Vec::new();
    if needs_distributor {
        parts.push(field_label(EntityKey::Distributor).to_string());
    }
    if needs_number {
        parts.push(format!(
            "{} ou {}",
            field_label(EntityKey::OrderNumber),
            field_label(EntityKey::InvoiceNumber)
        ));
    }

    format!(
        "Para consultar o status, preciso das seguintes informações: {}.",
        parts.join(" e ")
    )
}

/// Mock status text. The order number takes priority over the invoice.
pub fn resolved_message(entities: &EntityMap) -> String {
    let distributor = entities
        .distributor()
        .unwrap_or("distribuidor não especificado");

    if let Some(order) = entities.order_number() {
        return format!(
            "O pedido {} do distribuidor {} está em processamento. \
             A previsão de entrega é para 5 dias úteis.",
            order, distributor
        );
    }
    if let Some(invoice) = entities.invoice_number() {
        return format!(
            "A nota fiscal {} do distribuidor {} foi emitida e o produto está em trânsito. \
             A previsão de entrega é para 3 dias úteis.",
            invoice, distributor
        );
    }
    "Não foi possível identificar informações suficientes para processar sua consulta.".to_string()
}

pub fn error_message(description: &str) -> String {
    format!("Ocorreu um erro ao processar sua consulta: {}", description)
}

/// Lookup payload attached to resolved turns.
pub fn mock_payload(consulted_at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "consulted_at": consulted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        "source": "mock",
    })
}

/// Build the response for a classified turn.
pub fn compose(outcome: &TurnOutcome, entities: &EntityMap, now: DateTime<Utc>) -> Response {
    match outcome {
        TurnOutcome::Unsupported { distributor } => {
            Response::resolved(unsupported_message(distributor), entities, None)
        }
        TurnOutcome::MissingInfo { missing } => {
            Response::missing_info(missing_info_message(missing), entities, missing.clone())
        }
        TurnOutcome::Resolved => {
            Response::resolved(resolved_message(entities), entities, Some(mock_payload(now)))
        }
        TurnOutcome::Error { message } => Response::error(error_message(message), message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revend_core::ResponseStatus;

    fn entities(pairs: &[(EntityKey, &str)]) -> EntityMap {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_resolved_references_order_and_distributor() {
        let e = entities(&[(EntityKey::Distributor, "Officer"), (EntityKey::OrderNumber, "112233")]);
        let response = compose(&TurnOutcome::Resolved, &e, Utc::now());
        assert_eq!(response.status, ResponseStatus::Resolved);
        assert!(response.message.contains("112233"));
        assert!(response.message.contains("Officer"));
        assert_eq!(response.order_number.as_deref(), Some("112233"));
        assert_eq!(response.data.as_ref().unwrap()["source"], "mock");
    }

    #[test]
    fn test_order_takes_priority_over_invoice() {
        let e = entities(&[
            (EntityKey::Distributor, "Golden"),
            (EntityKey::OrderNumber, "1"),
            (EntityKey::InvoiceNumber, "2"),
        ]);
        let message = resolved_message(&e);
        assert!(message.starts_with("O pedido 1"));
    }

    #[test]
    fn test_invoice_message() {
        let e = entities(&[(EntityKey::Distributor, "Ingram"), (EntityKey::InvoiceNumber, "987")]);
        let message = resolved_message(&e);
        assert!(message.starts_with("A nota fiscal 987 do distribuidor Ingram"));
        assert!(message.contains("3 dias úteis"));
    }

    #[test]
    fn test_mock_payload_timestamp_is_rfc3339() {
        let now = Utc::now();
        let payload = mock_payload(now);
        let ts = payload["consulted_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_unsupported_has_no_payload() {
        let e = entities(&[(EntityKey::Distributor, "alcateia"), (EntityKey::OrderNumber, "999")]);
        let outcome = TurnOutcome::Unsupported {
            distributor: "alcateia".to_string(),
        };
        let response = compose(&outcome, &e, Utc::now());
        assert_eq!(response.status, ResponseStatus::Resolved);
        assert!(response.message.contains("alcateia"));
        assert!(response.message.contains("Officer, Ingram e Golden"));
        assert!(response.data.is_none());
    }

    #[test]
    fn test_missing_info_message() {
        let all = [EntityKey::Distributor, EntityKey::OrderNumber, EntityKey::InvoiceNumber];
        assert_eq!(
            missing_info_message(&all),
            "Para consultar o status, preciso das seguintes informações: \
             distribuidor e número do pedido ou número da nota fiscal."
        );
        assert_eq!(
            missing_info_message(&[EntityKey::Distributor]),
            "Para consultar o status, preciso das seguintes informações: distribuidor."
        );
    }

    #[test]
    fn test_error_response() {
        let outcome = TurnOutcome::Error {
            message: "store offline".to_string(),
        };
        let response = compose(&outcome, &EntityMap::new(), Utc::now());
        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(
            response.message,
            "Ocorreu um erro ao processar sua consulta: store offline"
        );
        assert_eq!(response.error.as_deref(), Some("store offline"));
    }
}
