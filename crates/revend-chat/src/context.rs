//! Carrying known facts across conversation turns.

use revend_core::{ConversationContext, EntityKey, Query};

/// Fill every entity the turn did not mention from the session context.
///
/// Values extracted from the current message are never overwritten. Returns
/// the keys that were filled from context.
pub fn merge_context(query: &mut Query, context: &ConversationContext) -> Vec<EntityKey> {
    let mut filled = Vec::new();
    for key in EntityKey::ALL {
        if query.entities.contains(key) {
            continue;
        }
        if let Some(value) = context.entities.get(key) {
            if query.entities.insert(key, value) {
                filled.push(key);
            }
        }
    }
    filled
}
