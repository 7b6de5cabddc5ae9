//! ONNX emotion backend — local sequence classification
//!
//! Expects an exported classifier directory containing `model.onnx`,
//! `tokenizer.json` and the Hugging Face `config.json` (for `id2label`).
//! Logits are softmaxed so every label gets a probability.

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::emotion::EmotionClassifier;
use crate::error::ModelError;
use crate::models::EmotionScore;

const MAX_SEQUENCE_TOKENS: usize = 512;

/// Local ONNX emotion classifier.
pub struct OnnxEmotionClassifier {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
    labels: Arc<Vec<String>>,
}

impl std::fmt::Debug for OnnxEmotionClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmotionClassifier")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ClassifierConfig {
    id2label: HashMap<String, String>,
}

/// Paths of the three files that make up an exported classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierFiles {
    pub model: PathBuf,
    pub tokenizer: PathBuf,
    pub config: PathBuf,
}

impl ClassifierFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join("model.onnx"),
            tokenizer: dir.join("tokenizer.json"),
            config: dir.join("config.json"),
        }
    }
}

impl OnnxEmotionClassifier {
    /// Load the classifier from `model_dir`.
    ///
    /// Returns `ModelError::ModelNotFound` naming the first missing file.
    pub fn new(model_dir: &Path) -> Result<Self, ModelError> {
        let files = ClassifierFiles::in_dir(model_dir);
        for path in [&files.model, &files.tokenizer, &files.config] {
            if !path.exists() {
                return Err(ModelError::ModelNotFound {
                    path: path.display().to_string(),
                });
            }
        }

        let config_data = std::fs::read_to_string(&files.config)
            .map_err(|e| ModelError::OnnxInference(format!("failed to read config.json: {e}")))?;
        let labels = parse_labels(&config_data)?;

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&files.model))
            .map_err(|e| ModelError::OnnxInference(e.to_string()))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

        tracing::info!(labels = ?labels, "Loaded ONNX emotion classifier");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            labels: Arc::new(labels),
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[async_trait]
impl EmotionClassifier for OnnxEmotionClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, ModelError> {
        // Inference is CPU-bound — run on the blocking thread pool.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let labels = Arc::clone(&self.labels);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut session_guard = session
                .lock()
                .map_err(|e| ModelError::OnnxInference(format!("session lock poisoned: {e}")))?;
            let logits = logits_sync(&mut session_guard, &tokenizer, &text)?;
            label_scores(&labels, &logits)
        })
        .await
        .map_err(|e| ModelError::OnnxInference(format!("spawn_blocking join error: {e}")))?
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Order `id2label` by numeric id.
fn parse_labels(config_json: &str) -> Result<Vec<String>, ModelError> {
    let config: ClassifierConfig = serde_json::from_str(config_json)
        .map_err(|e| ModelError::OnnxInference(format!("failed to parse config.json: {e}")))?;

    let mut labels = vec![String::new(); config.id2label.len()];
    for (id, label) in config.id2label {
        let idx: usize = id
            .parse()
            .map_err(|_| ModelError::OnnxInference(format!("invalid label id '{id}'")))?;
        let slot = labels.get_mut(idx).ok_or_else(|| {
            ModelError::OnnxInference(format!("label id {idx} out of range"))
        })?;
        *slot = label;
    }
    Ok(labels)
}

fn logits_sync(
    session: &mut Session,
    tokenizer: &tokenizers::Tokenizer,
    text: &str,
) -> Result<Vec<f32>, ModelError> {
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

    let mut input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let mut attention_mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();
    input_ids.truncate(MAX_SEQUENCE_TOKENS);
    attention_mask.truncate(MAX_SEQUENCE_TOKENS);

    let shape = vec![1i64, input_ids.len() as i64];

    let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids))
        .map_err(|e| ModelError::OnnxInference(e.to_string()))?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
        .map_err(|e| ModelError::OnnxInference(e.to_string()))?;

    // RoBERTa-family exports take no token_type_ids.
    let inputs = ort::inputs! {
        "input_ids" => input_ids_tensor,
        "attention_mask" => attention_mask_tensor,
    };

    let outputs = session
        .run(inputs)
        .map_err(|e| ModelError::OnnxInference(e.to_string()))?;

    // Expected shape: [1, num_labels]
    let (out_shape, data) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| ModelError::OnnxInference(e.to_string()))?;

    if out_shape.len() != 2 {
        return Err(ModelError::OnnxInference(format!(
            "Expected 2D logits, got {}D",
            out_shape.len()
        )));
    }

    Ok(data.to_vec())
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|e| e / sum).collect()
    } else {
        exps
    }
}

fn label_scores(labels: &[String], logits: &[f32]) -> Result<Vec<EmotionScore>, ModelError> {
    if logits.len() != labels.len() {
        return Err(ModelError::OnnxInference(format!(
            "Expected {} logits, got {}",
            labels.len(),
            logits.len()
        )));
    }
    Ok(labels
        .iter()
        .zip(softmax(logits))
        .map(|(label, score)| EmotionScore::new(label.clone(), score))
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found_returns_error() {
        let result = OnnxEmotionClassifier::new(Path::new("/nonexistent/emotion"));
        match result {
            Err(ModelError::ModelNotFound { path }) => {
                assert!(path.ends_with("model.onnx"), "path was: {path}");
            }
            other => panic!("Expected ModelNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_parse_labels_orders_by_id() {
        let json = r#"{"id2label": {"2": "joy", "0": "anger", "1": "fear"}, "model_type": "roberta"}"#;
        assert_eq!(parse_labels(json).unwrap(), vec!["anger", "fear", "joy"]);
    }

    #[test]
    fn test_parse_labels_rejects_gaps() {
        let json = r#"{"id2label": {"0": "anger", "5": "joy"}}"#;
        assert!(parse_labels(json).is_err());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.0, 1.0, 0.1]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn test_label_scores_length_mismatch() {
        let labels = vec!["joy".to_string(), "sadness".to_string()];
        assert!(label_scores(&labels, &[0.3]).is_err());
        let scores = label_scores(&labels, &[3.0, 0.0]).unwrap();
        assert_eq!(scores[0].label, "joy");
        assert!(scores[0].score > 0.9);
    }

    #[test]
    fn test_classifier_files_in_dir() {
        let files = ClassifierFiles::in_dir(Path::new("/opt/models/emotion"));
        assert_eq!(files.model, PathBuf::from("/opt/models/emotion/model.onnx"));
        assert_eq!(files.tokenizer, PathBuf::from("/opt/models/emotion/tokenizer.json"));
        assert_eq!(files.config, PathBuf::from("/opt/models/emotion/config.json"));
    }
}
