//! Shared plumbing for hosted inference APIs.
//!
//! Both model clients speak the same `POST {base_url}/models/{model}` protocol:
//! a JSON body with `inputs`, `parameters` and `options`, bearer-token auth and
//! `{"error": "..."}` bodies on failure. Each call is a single attempt; a failure
//! reaches the caller as-is.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Connection settings for one hosted model.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub model: String,
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
}

impl InferenceConfig {
    /// Reads the API token from `HF_API_TOKEN` when set.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_token: std::env::var("HF_API_TOKEN").ok().filter(|t| !t.is_empty()),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct InferenceRequest<'a, P: Serialize> {
    pub inputs: &'a str,
    pub parameters: P,
    pub options: InferenceOptions,
}

#[derive(Debug, Serialize)]
pub(crate) struct InferenceOptions {
    pub wait_for_model: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            wait_for_model: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InferenceErrorBody {
    error: String,
}

/// HTTP client bound to one model endpoint.
#[derive(Debug, Clone)]
pub(crate) struct InferenceClient {
    client: Client,
    config: InferenceConfig,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// POST `body` once. Non-2xx replies become `ModelError::Api`.
    pub async fn post<B, R>(&self, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<InferenceErrorBody>(&error_body)
                .map(|e| e.error)
                .unwrap_or(error_body);

            tracing::warn!(
                model = %self.config.model,
                code = status.as_u16(),
                message = %message,
                "Inference API error"
            );

            return Err(ModelError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
