//! ONNX Runtime token-classification pipeline.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use revend_core::{Result, RevendError};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::info;

use super::{entity_group, NerPipeline, NerSpan};

/// The part of a HuggingFace `config.json` we need.
#[derive(Debug, Deserialize)]
struct ModelLabels {
    id2label: HashMap<String, String>,
}

/// Token-classification model exported to ONNX.
///
/// Expects a model directory containing:
/// - `model.onnx` the token-classification export (logits `[1, seq, labels]`)
/// - `tokenizer.json` the HuggingFace fast-tokenizer file
/// - `config.json` with an `id2label` table
///
/// Tokens are labelled by argmax and consecutive tokens of the same entity
/// group are merged into one span.
pub struct OnnxNerPipeline {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    labels: Vec<String>,
    uses_token_type_ids: bool,
}

impl std::fmt::Debug for OnnxNerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxNerPipeline")
            .field("labels", &self.labels.len())
            .field("uses_token_type_ids", &self.uses_token_type_ids)
            .finish()
    }
}

impl OnnxNerPipeline {
    pub fn from_directory(model_dir: &Path) -> Result<Self> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let config_path = model_dir.join("config.json");

        for path in [&model_path, &tokenizer_path, &config_path] {
            if !path.exists() {
                return Err(RevendError::Model(format!(
                    "{} not found",
                    path.display()
                )));
            }
        }

        let labels = load_labels(&config_path)?;

        let session = Session::builder()
            .map_err(|e| RevendError::Model(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| RevendError::Model(format!("ONNX set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| RevendError::Model(format!("ONNX load model: {}", e)))?;

        // BERT exports take token_type_ids, RoBERTa-style exports do not.
        let uses_token_type_ids = session.inputs().len() > 2;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| RevendError::Model(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            model = %model_path.display(),
            labels = labels.len(),
            "Loaded ONNX token-classification model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            labels,
            uses_token_type_ids,
        })
    }

    /// Per-token (label, score, byte offsets), special tokens skipped.
    fn classify_tokens(&self, text: &str) -> Result<Vec<(String, f32, (usize, usize))>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| RevendError::Inference(format!("Tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
        let seq_len = input_ids.len();

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| RevendError::Inference(format!("input_ids array: {}", e)))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask)
            .map_err(|e| RevendError::Inference(format!("attention_mask array: {}", e)))?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| RevendError::Inference(format!("token_type_ids array: {}", e)))?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| RevendError::Inference(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| RevendError::Inference(format!("TensorRef attention_mask: {}", e)))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| RevendError::Inference(format!("TensorRef token_type_ids: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| RevendError::Inference(format!("Session lock poisoned: {}", e)))?;
        let run_result = if self.uses_token_type_ids {
            session.run(ort::inputs![ids_ref, mask_ref, type_ref])
        } else {
            session.run(ort::inputs![ids_ref, mask_ref])
        };
        let outputs = run_result.map_err(|e| RevendError::Inference(format!("ONNX inference failed: {}", e)))?;

        // Logits: [1, seq_len, num_labels].
        let (shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RevendError::Inference(format!("Extract logits: {}", e)))?;
        let dims: Vec<i64> = shape.iter().copied().collect();
        let num_labels = match dims.as_slice() {
            [_, seq, labels] if *seq as usize == seq_len && *labels > 0 => *labels as usize,
            other => {
                return Err(RevendError::Inference(format!(
                    "Unexpected logits shape: {:?}",
                    other
                )))
            }
        };

        let special = encoding.get_special_tokens_mask();
        let offsets = encoding.get_offsets();
        let mut tokens = Vec::with_capacity(seq_len);

        for tok_idx in 0..seq_len {
            let (start, end) = offsets[tok_idx];
            if special[tok_idx] == 1 || start == end {
                continue;
            }
            let row = &logits[tok_idx * num_labels..(tok_idx + 1) * num_labels];
            let (label_idx, score) = argmax_softmax(row);
            let label = self
                .labels
                .get(label_idx)
                .cloned()
                .unwrap_or_else(|| format!("LABEL_{}", label_idx));
            tokens.push((label, score, (start, end)));
        }

        Ok(tokens)
    }
}

impl NerPipeline for OnnxNerPipeline {
    fn run(&self, text: &str) -> Result<Vec<NerSpan>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self.classify_tokens(text)?;
        Ok(aggregate_simple(text, &tokens))
    }
}

fn load_labels(config_path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(config_path)?;
    let config: ModelLabels = serde_json::from_str(&content)?;

    let mut indexed: Vec<(usize, String)> = config
        .id2label
        .into_iter()
        .map(|(id, label)| {
            id.parse::<usize>()
                .map(|id| (id, label))
                .map_err(|_| RevendError::Model(format!("Invalid id2label key: {}", id)))
        })
        .collect::<Result<_>>()?;
    indexed.sort_by_key(|(id, _)| *id);

    let mut labels = vec!["O".to_string(); indexed.last().map(|(id, _)| id + 1).unwrap_or(0)];
    for (id, label) in indexed {
        labels[id] = label;
    }
    Ok(labels)
}

/// Index of the largest logit and its softmax probability.
fn argmax_softmax(row: &[f32]) -> (usize, f32) {
    let (best, max) = row
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });
    let denom: f32 = row.iter().map(|v| (v - max).exp()).sum();
    let score = if denom > 0.0 { 1.0 / denom } else { 0.0 };
    (best, score)
}

/// Merge consecutive tokens of the same entity group into spans. A `B-` tag
/// always opens a new span; `O` closes the current one.
fn aggregate_simple(text: &str, tokens: &[(String, f32, (usize, usize))]) -> Vec<NerSpan> {
    struct Open {
        group: String,
        start: usize,
        end: usize,
        scores: Vec<f32>,
    }

    fn close(text: &str, open: Open, spans: &mut Vec<NerSpan>) {
        let word = text.get(open.start..open.end).unwrap_or_default().trim();
        if word.is_empty() {
            return;
        }
        let score = open.scores.iter().sum::<f32>() / open.scores.len().max(1) as f32;
        spans.push(NerSpan {
            word: word.to_string(),
            label: open.group,
            start: open.start,
            end: open.end,
            score,
        });
    }

    let mut spans = Vec::new();
    let mut current: Option<Open> = None;

    for (label, score, (start, end)) in tokens {
        if label == "O" {
            if let Some(open) = current.take() {
                close(text, open, &mut spans);
            }
            continue;
        }

        let group = entity_group(label);
        let begins = label.starts_with("B-");
        match current.as_mut() {
            Some(open) if open.group == group && !begins => {
                open.end = *end;
                open.scores.push(*score);
            }
            _ => {
                if let Some(open) = current.take() {
                    close(text, open, &mut spans);
                }
                current = Some(Open {
                    group: group.to_string(),
                    start: *start,
                    end: *end,
                    scores: vec![*score],
                });
            }
        }
    }

    if let Some(open) = current.take() {
        close(text, open, &mut spans);
    }
    spans
}
