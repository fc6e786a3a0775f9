use revend_core::{EntityMap, Result};
use tracing::{debug, warn};

use crate::extractor::EntityExtractor;

/// Ordered cascade of extractors.
///
/// Each tier is tried in turn; the first non-empty result wins. A tier that
/// errors or finds nothing hands the same text to the next tier. When every
/// tier comes back empty the result is an empty map; an error is only
/// returned when no tier succeeded at all.
#[derive(Default)]
pub struct ExtractorChain {
    tiers: Vec<Box<dyn EntityExtractor>>,
}

impl ExtractorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier to the end of the chain.
    pub fn then(mut self, extractor: impl EntityExtractor + 'static) -> Self {
        self.tiers.push(Box::new(extractor));
        self
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }
}

impl EntityExtractor for ExtractorChain {
    fn name(&self) -> &str {
        "chain"
    }

    fn extract(&self, text: &str) -> Result<EntityMap> {
        let mut last_error = None;
        let mut any_succeeded = false;

        for tier in &self.tiers {
            match tier.extract(text) {
                Ok(entities) if !entities.is_empty() => {
                    debug!(tier = tier.name(), found = entities.len(), "Entities extracted");
                    return Ok(entities);
                }
                Ok(_) => {
                    debug!(tier = tier.name(), "No entities found, trying next tier");
                    any_succeeded = true;
                }
                Err(e) => {
                    warn!(tier = tier.name(), error = %e, "Entity extraction failed, trying next tier");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(EntityMap::new()),
        }
    }
}
