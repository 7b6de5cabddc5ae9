//! Reply generation backends and input truncation.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::inference::{InferenceClient, InferenceConfig, InferenceOptions, InferenceRequest};

/// Abstraction over text generation models.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce one decoded continuation for `query`.
    async fn generate(&self, query: &str) -> Result<String, ModelError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Sampling parameters
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SamplingParams {
    pub max_length: u32,
    pub min_length: u32,
    pub top_p: f32,
    pub do_sample: bool,
    pub num_return_sequences: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_length: 200,
            min_length: 30,
            top_p: 0.9,
            do_sample: true,
            num_return_sequences: 1,
        }
    }
}

// ============================================================================
// HTTP backend
// ============================================================================

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    List(Vec<GeneratedText>),
    Single(GeneratedText),
}

impl GenerateResponse {
    fn first(self) -> Option<String> {
        match self {
            GenerateResponse::List(items) => items.into_iter().next().map(|g| g.generated_text),
            GenerateResponse::Single(g) => Some(g.generated_text),
        }
    }
}

/// Hosted text2text model (e.g. `microsoft/GODEL-v1_1-large-seq2seq`).
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    inner: InferenceClient,
    params: SamplingParams,
}

impl HttpGenerationClient {
    pub fn new(config: InferenceConfig, params: SamplingParams) -> Result<Self, ModelError> {
        Ok(Self {
            inner: InferenceClient::new(config)?,
            params,
        })
    }

    pub fn params(&self) -> &SamplingParams {
        &self.params
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn generate(&self, query: &str) -> Result<String, ModelError> {
        let request = InferenceRequest {
            inputs: query,
            parameters: &self.params,
            options: InferenceOptions::default(),
        };

        let response: GenerateResponse = self.inner.post(&request).await?;
        let text = response.first().ok_or(ModelError::EmptyResponse)?;

        tracing::debug!(model = %self.inner.model(), chars = text.len(), "Generated reply");
        Ok(text)
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// QueryTruncator
// ============================================================================

/// Cuts a query to a fixed token budget before it is sent for generation.
///
/// Without a tokenizer the query passes through untouched and the remote
/// model applies its own truncation.
pub struct QueryTruncator {
    tokenizer: Option<tokenizers::Tokenizer>,
    max_tokens: usize,
}

impl std::fmt::Debug for QueryTruncator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryTruncator")
            .field("tokenizer", &self.tokenizer.is_some())
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl QueryTruncator {
    pub fn passthrough(max_tokens: usize) -> Self {
        Self {
            tokenizer: None,
            max_tokens,
        }
    }

    pub fn new(tokenizer: tokenizers::Tokenizer, max_tokens: usize) -> Self {
        Self {
            tokenizer: Some(tokenizer),
            max_tokens,
        }
    }

    /// Load a `tokenizer.json`. An empty path yields a passthrough truncator.
    pub fn from_path(path: &str, max_tokens: usize) -> Result<Self, ModelError> {
        if path.is_empty() {
            return Ok(Self::passthrough(max_tokens));
        }
        if !Path::new(path).exists() {
            return Err(ModelError::ModelNotFound {
                path: path.to_string(),
            });
        }
        let tokenizer = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        Ok(Self::new(tokenizer, max_tokens))
    }

    /// Parse a tokenizer from its JSON definition.
    pub fn from_json(json: &str, max_tokens: usize) -> Result<Self, ModelError> {
        let tokenizer = tokenizers::Tokenizer::from_str(json)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        Ok(Self::new(tokenizer, max_tokens))
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn truncate<'a>(&self, query: &'a str) -> Result<&'a str, ModelError> {
        let Some(tokenizer) = &self.tokenizer else {
            return Ok(query);
        };
        if self.max_tokens == 0 {
            return Ok("");
        }

        let encoding = tokenizer
            .encode(query, false)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        let offsets = encoding.get_offsets();
        if offsets.len() <= self.max_tokens {
            return Ok(query);
        }

        let (_, end) = offsets[self.max_tokens - 1];
        let truncated = query.get(..end).unwrap_or(query);
        tracing::debug!(
            tokens = offsets.len(),
            max_tokens = self.max_tokens,
            "Truncated generation query"
        );
        Ok(truncated)
    }
}

// ============================================================================
// TESTS
// ============================================================================
