use revend_core::{EntityMap, Result};

/// One strategy for pulling entities out of a message.
///
/// Implementations must be shareable across request handlers. An empty map
/// means "nothing found", which [`ExtractorChain`](crate::ExtractorChain)
/// treats the same as a failure and moves on to the next tier.
pub trait EntityExtractor: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Extract entities from `text`.
    fn extract(&self, text: &str) -> Result<EntityMap>;
}

impl<T: EntityExtractor + ?Sized> EntityExtractor for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn extract(&self, text: &str) -> Result<EntityMap> {
        (**self).extract(text)
    }
}
