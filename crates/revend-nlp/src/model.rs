//! Model-backed extraction tiers.
//!
//! The primary tier understands the task-specific labels of a fine-tuned
//! model (`DISTRIBUIDOR`, `PEDIDO`, `NOTA_FISCAL`, ...). The secondary tier
//! reads a generic NER model and infers order/invoice numbers from the words
//! that precede each number. [`ModelBackedExtractor`] picks whichever tier
//! loaded and chains it in front of the heuristic extractor.

use std::path::Path;
use std::sync::Arc;

use revend_core::config::NlpConfig;
use revend_core::{EntityKey, EntityMap, Result};
use tracing::{info, warn};

use crate::chain::ExtractorChain;
use crate::extractor::EntityExtractor;
use crate::heuristic::{lowercase_prefix, mentions_invoice, mentions_order, HeuristicExtractor};
use crate::pipeline::{self, NerPipeline, NerSpan};

const DISTRIBUTOR_LABELS: [&str; 3] = ["DISTRIBUIDOR", "ORG", "ORGANIZATION"];
const ORDER_LABELS: [&str; 2] = ["PEDIDO", "ORDER"];
const INVOICE_LABELS: [&str; 3] = ["NOTA", "FISCAL", "INVOICE"];

/// At least one ASCII digit survives stripping everything else.
pub fn is_numeric_like(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

fn label_matches(label_upper: &str, group: &[&str]) -> bool {
    group.iter().any(|g| label_upper.contains(g))
}

// =============================================================================
// Primary tier
// =============================================================================

/// Map task-specific labels onto entity keys.
///
/// Label groups are checked in order (distributor, order, invoice) and the
/// first group that matches decides the key. Later spans overwrite earlier
/// ones for the same key.
pub fn map_primary_spans(spans: &[NerSpan]) -> EntityMap {
    let mut result = EntityMap::new();

    for span in spans {
        let label = span.label.to_uppercase();
        let word = span.word.trim();

        if label_matches(&label, &DISTRIBUTOR_LABELS) {
            result.insert(EntityKey::Distributor, word);
        } else if label_matches(&label, &ORDER_LABELS) {
            if is_numeric_like(word) {
                result.insert(EntityKey::OrderNumber, word);
            }
        } else if label_matches(&label, &INVOICE_LABELS) && is_numeric_like(word) {
            result.insert(EntityKey::InvoiceNumber, word);
        }
    }

    result
}

/// Extractor over a fine-tuned token-classification model.
pub struct PrimaryModelExtractor {
    pipeline: Arc<dyn NerPipeline>,
}

impl PrimaryModelExtractor {
    pub fn new(pipeline: Arc<dyn NerPipeline>) -> Self {
        Self { pipeline }
    }
}

impl EntityExtractor for PrimaryModelExtractor {
    fn name(&self) -> &str {
        "primary-model"
    }

    fn extract(&self, text: &str) -> Result<EntityMap> {
        let spans = self.pipeline.run(text)?;
        Ok(map_primary_spans(&spans))
    }
}

// =============================================================================
// Secondary tier
// =============================================================================

fn is_org_tag(label: &str) -> bool {
    label.ends_with("-ORG") || label == "ORG"
}

fn is_number_tag(label: &str) -> bool {
    label.ends_with("CARDINAL") || label.ends_with("NUM")
}

/// Map generic NER output onto entity keys.
///
/// The first organisation span is the distributor. Each numeric span is an
/// order when the preceding text mentions an order, an invoice when it
/// mentions an invoice, and otherwise the order if none was set yet.
pub fn map_secondary_spans(spans: &[NerSpan], text: &str) -> EntityMap {
    let mut result = EntityMap::new();

    if let Some(org) = spans.iter().find(|s| is_org_tag(&s.label)) {
        result.insert(EntityKey::Distributor, org.word.trim());
    }

    for span in spans.iter().filter(|s| is_number_tag(&s.label)) {
        let word = span.word.trim();
        if !is_numeric_like(word) {
            continue;
        }
        let context_before = lowercase_prefix(text, span.start);
        if mentions_order(&context_before) {
            result.insert(EntityKey::OrderNumber, word);
        } else if mentions_invoice(&context_before) {
            result.insert(EntityKey::InvoiceNumber, word);
        } else if !result.contains(EntityKey::OrderNumber) {
            result.insert(EntityKey::OrderNumber, word);
        }
    }

    result
}

/// Extractor over a generic NER model.
pub struct SecondaryModelExtractor {
    pipeline: Arc<dyn NerPipeline>,
}

impl SecondaryModelExtractor {
    pub fn new(pipeline: Arc<dyn NerPipeline>) -> Self {
        Self { pipeline }
    }
}

impl EntityExtractor for SecondaryModelExtractor {
    fn name(&self) -> &str {
        "secondary-model"
    }

    fn extract(&self, text: &str) -> Result<EntityMap> {
        let spans = self.pipeline.run(text)?;
        Ok(map_secondary_spans(&spans, text))
    }
}

// =============================================================================
// ModelBackedExtractor
// =============================================================================

/// Which model tier was loaded at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelMode {
    Primary,
    Secondary,
    HeuristicOnly,
}

impl ModelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelMode::Primary => "primary",
            ModelMode::Secondary => "secondary",
            ModelMode::HeuristicOnly => "heuristic_only",
        }
    }
}

/// The production extractor: the loaded model tier, then heuristics.
///
/// Built once at startup and never swapped. A failing or empty model call
/// only reroutes that call; the next call tries the model again.
pub struct ModelBackedExtractor {
    chain: ExtractorChain,
    mode: ModelMode,
}

impl ModelBackedExtractor {
    /// Load models from the configured directories using the ONNX runtime.
    pub fn load(config: &NlpConfig) -> Self {
        Self::load_with(config, pipeline::load_pipeline)
    }

    /// Load cascade with an explicit loader: primary model, then the
    /// fallback model, then heuristics only.
    pub fn load_with<F>(config: &NlpConfig, loader: F) -> Self
    where
        F: Fn(&Path) -> Result<Arc<dyn NerPipeline>>,
    {
        info!(model = %config.model_dir, "Loading primary NER model");
        let primary_err = match loader(Path::new(&config.model_dir)) {
            Ok(pipeline) => {
                info!(model = %config.model_dir, "Primary NER model loaded");
                return Self::with_primary(pipeline);
            }
            Err(e) => e,
        };
        warn!(model = %config.model_dir, error = %primary_err, "Failed to load primary NER model");

        let Some(fallback_dir) = config.fallback_model_dir.as_deref() else {
            warn!("No fallback NER model configured, using heuristic extraction only");
            return Self::heuristic_only();
        };

        match loader(Path::new(fallback_dir)) {
            Ok(pipeline) => {
                info!(model = %fallback_dir, "Fallback NER model loaded");
                Self::with_secondary(pipeline)
            }
            Err(e) => {
                warn!(
                    model = %fallback_dir,
                    error = %e,
                    "Failed to load fallback NER model, using heuristic extraction only"
                );
                Self::heuristic_only()
            }
        }
    }

    pub fn with_primary(pipeline: Arc<dyn NerPipeline>) -> Self {
        Self {
            chain: ExtractorChain::new()
                .then(PrimaryModelExtractor::new(pipeline))
                .then(HeuristicExtractor::new()),
            mode: ModelMode::Primary,
        }
    }

    pub fn with_secondary(pipeline: Arc<dyn NerPipeline>) -> Self {
        Self {
            chain: ExtractorChain::new()
                .then(SecondaryModelExtractor::new(pipeline))
                .then(HeuristicExtractor::new()),
            mode: ModelMode::Secondary,
        }
    }

    pub fn heuristic_only() -> Self {
        Self {
            chain: ExtractorChain::new().then(HeuristicExtractor::new()),
            mode: ModelMode::HeuristicOnly,
        }
    }

    pub fn mode(&self) -> ModelMode {
        self.mode
    }

    /// Names of the tiers tried on each call, in order.
    pub fn tier_names(&self) -> Vec<&str> {
        self.chain.tier_names()
    }

    /// True when running on the generic fallback model.
    pub fn is_fallback(&self) -> bool {
        self.mode == ModelMode::Secondary
    }
}

impl EntityExtractor for ModelBackedExtractor {
    fn name(&self) -> &str {
        "model-backed"
    }

    fn extract(&self, text: &str) -> Result<EntityMap> {
        self.chain.extract(text)
    }
}

// =============================================================================
// Tests
// =============================================================================
