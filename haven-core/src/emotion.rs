//! Emotion classification backends.
//!
//! Provides an `EmotionClassifier` trait with implementations for:
//! - **HTTP** — a hosted text-classification endpoint returning every label's score
//! - **ONNX** — local inference, see [`crate::onnx_classifier`]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::inference::{InferenceClient, InferenceConfig, InferenceOptions, InferenceRequest};
use crate::models::emotion::dominant;
use crate::models::EmotionScore;

/// Abstraction over emotion classifiers.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Score `text` against the classifier's full label set.
    async fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, ModelError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Classify `text` and keep only the dominant emotion, score rounded to 2dp.
pub async fn dominant_emotion(
    classifier: &dyn EmotionClassifier,
    text: &str,
) -> Result<EmotionScore, ModelError> {
    let scores = classifier.classify(text).await?;
    dominant(&scores)
        .map(EmotionScore::rounded)
        .ok_or(ModelError::EmptyClassification)
}

// ============================================================================
// HTTP backend
// ============================================================================

#[derive(Debug, Serialize)]
struct ClassifyParameters {
    /// `null` asks the endpoint for every label rather than the top one.
    top_k: Option<u32>,
}

/// Text-classification endpoints answer either `[[{..}]]` (one list per input)
/// or a flat `[{..}]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Batched(Vec<Vec<EmotionScore>>),
    Flat(Vec<EmotionScore>),
}

impl ClassifyResponse {
    fn into_scores(self) -> Vec<EmotionScore> {
        match self {
            ClassifyResponse::Batched(batches) => batches.into_iter().next().unwrap_or_default(),
            ClassifyResponse::Flat(scores) => scores,
        }
    }
}

/// Hosted emotion classifier (e.g. `j-hartmann/emotion-english-distilroberta-base`).
#[derive(Debug, Clone)]
pub struct HttpEmotionClient {
    inner: InferenceClient,
}

impl HttpEmotionClient {
    pub fn new(config: InferenceConfig) -> Result<Self, ModelError> {
        Ok(Self {
            inner: InferenceClient::new(config)?,
        })
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }
}

#[async_trait]
impl EmotionClassifier for HttpEmotionClient {
    async fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, ModelError> {
        let request = InferenceRequest {
            inputs: text,
            parameters: ClassifyParameters { top_k: None },
            options: InferenceOptions::default(),
        };

        let response: ClassifyResponse = self.inner.post(&request).await?;
        let scores = response.into_scores();

        tracing::debug!(model = %self.inner.model(), labels = scores.len(), "Classified utterance");
        Ok(scores)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// TESTS
// ============================================================================
