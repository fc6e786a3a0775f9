//! Deterministic keyword and pattern extraction.
//!
//! The extractor of last resort: it never fails and is used whenever the
//! model tiers are unavailable, fail, or find nothing.

use std::sync::LazyLock;

use regex::Regex;
use revend_core::{EntityKey, EntityMap, Result, SUPPORTED_DISTRIBUTORS, UNSUPPORTED_DISTRIBUTORS};

use crate::extractor::EntityExtractor;

// =============================================================================
// Compiled patterns
// =============================================================================

/// Whole-word, case-insensitive pattern per known distributor, supported
/// ones first. The first pattern that matches wins.
static DISTRIBUTOR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SUPPORTED_DISTRIBUTORS
        .iter()
        .chain(UNSUPPORTED_DISTRIBUTORS.iter())
        .map(|name| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))
                .expect("Invalid distributor regex")
        })
        .collect()
});

static ORDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pedido|order)\s*[:#]?\s*(\d+)\b").expect("Invalid order regex")
});

static INVOICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:nota\s*fiscal|nf)\s*[:#]?\s*(\d+)\b").expect("Invalid invoice regex")
});

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("Invalid digit regex"));

// =============================================================================
// Keyword context
// =============================================================================

/// Lowercased text preceding a number mentions an order.
pub(crate) fn mentions_order(context_before: &str) -> bool {
    context_before.contains("pedido") || context_before.contains("order")
}

/// Lowercased text preceding a number mentions an invoice.
///
/// Plain substring match, so "nf" inside a longer word counts.
pub(crate) fn mentions_invoice(context_before: &str) -> bool {
    context_before.contains("nota") || context_before.contains("fiscal") || context_before.contains("nf")
}

/// Lowercased slice of `text` before byte offset `start`, clamped to the
/// nearest char boundary at or below it.
pub(crate) fn lowercase_prefix(text: &str, start: usize) -> String {
    let mut end = start.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_lowercase()
}

// =============================================================================
// HeuristicExtractor
// =============================================================================

/// Keyword and regex based extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Infallible extraction. Each step only fills keys still unset.
    pub fn extract_entities(&self, text: &str) -> EntityMap {
        let mut result = EntityMap::new();

        if let Some(m) = DISTRIBUTOR_PATTERNS.iter().find_map(|re| re.find(text)) {
            result.insert(EntityKey::Distributor, m.as_str().trim());
        }

        if let Some(caps) = ORDER_PATTERN.captures(text) {
            result.insert(EntityKey::OrderNumber, &caps[1]);
        }

        if let Some(caps) = INVOICE_PATTERN.captures(text) {
            result.insert(EntityKey::InvoiceNumber, &caps[1]);
        }

        if !result.contains(EntityKey::OrderNumber) && !result.contains(EntityKey::InvoiceNumber) {
            for m in DIGIT_RUN.find_iter(text) {
                let context_before = lowercase_prefix(text, m.start());
                if mentions_invoice(&context_before) {
                    result.insert(EntityKey::InvoiceNumber, m.as_str());
                } else if mentions_order(&context_before) {
                    result.insert(EntityKey::OrderNumber, m.as_str());
                } else if !result.contains(EntityKey::OrderNumber) {
                    result.insert(EntityKey::OrderNumber, m.as_str());
                }
            }
        }

        result
    }
}

impl EntityExtractor for HeuristicExtractor {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn extract(&self, text: &str) -> Result<EntityMap> {
        Ok(self.extract_entities(text))
    }
}

// =============================================================================
// Tests
// =============================================================================
