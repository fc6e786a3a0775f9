//! Entity extraction for Revend.
//!
//! A cascade of extractors turns a customer message into an [`EntityMap`]:
//! a task-specific token-classification model, a generic NER model, and a
//! deterministic keyword/pattern extractor that never fails.
//!
//! [`EntityMap`]: revend_core::EntityMap

pub mod chain;
pub mod extractor;
pub mod heuristic;
pub mod model;
pub mod pipeline;

pub use chain::ExtractorChain;
pub use extractor::EntityExtractor;
pub use heuristic::HeuristicExtractor;
pub use model::{ModelBackedExtractor, ModelMode, PrimaryModelExtractor, SecondaryModelExtractor};
pub use pipeline::{load_pipeline, NerPipeline, NerSpan};
