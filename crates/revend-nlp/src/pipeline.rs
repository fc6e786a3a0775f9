//! Token-classification runtime.
//!
//! - `NerPipeline` is the seam the model tiers run against.
//! - `OnnxNerPipeline` (feature `onnx`) loads a HuggingFace token-classification
//!   export via ort and tokenizes with the tokenizers crate.

use std::path::Path;
use std::sync::Arc;

use revend_core::Result;
use serde::{Deserialize, Serialize};

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxNerPipeline;

/// One labelled span of the input text.
///
/// `start`/`end` are byte offsets into the text passed to
/// [`NerPipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerSpan {
    pub word: String,
    /// Raw tag (`B-ORG`) or aggregated entity group (`ORG`).
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

impl NerSpan {
    pub fn new(word: impl Into<String>, label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            word: word.into(),
            label: label.into(),
            start,
            end,
            score: 1.0,
        }
    }
}

/// A loaded sequence-labelling model.
pub trait NerPipeline: Send + Sync {
    fn run(&self, text: &str) -> Result<Vec<NerSpan>>;
}

/// Load the production pipeline from a model directory.
#[cfg(feature = "onnx")]
pub fn load_pipeline(model_dir: &Path) -> Result<Arc<dyn NerPipeline>> {
    let pipeline = OnnxNerPipeline::from_directory(model_dir)?;
    Ok(Arc::new(pipeline))
}

/// Without the `onnx` feature there is no runtime to load models into.
#[cfg(not(feature = "onnx"))]
pub fn load_pipeline(model_dir: &Path) -> Result<Arc<dyn NerPipeline>> {
    Err(revend_core::RevendError::Model(format!(
        "cannot load {}: built without the `onnx` feature",
        model_dir.display()
    )))
}

/// Strip a BIO/BILOU prefix (`B-`, `I-`, `E-`, `S-`, `L-`, `U-`) from a tag.
pub fn entity_group(label: &str) -> &str {
    match label.split_once('-') {
        Some((prefix, group)) if matches!(prefix, "B" | "I" | "E" | "S" | "L" | "U") => group,
        _ => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(not(feature = "onnx"))]
    use revend_core::RevendError;

    #[test]
    fn test_entity_group_strips_prefix() {
        assert_eq!(entity_group("B-ORG"), "ORG");
        assert_eq!(entity_group("I-PEDIDO"), "PEDIDO");
        assert_eq!(entity_group("U-NOTA_FISCAL"), "NOTA_FISCAL");
        assert_eq!(entity_group("ORG"), "ORG");
        assert_eq!(entity_group("O"), "O");
        assert_eq!(entity_group("X-ORG"), "X-ORG");
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_load_without_runtime_is_model_error() {
        let result = load_pipeline(Path::new("/nonexistent"));
        assert!(matches!(result, Err(RevendError::Model(_))));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_load_missing_model() {
        assert!(load_pipeline(Path::new("/nonexistent")).is_err());
    }
}
