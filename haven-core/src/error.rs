use thiserror::Error;

#[derive(Error, Debug)]
pub enum HavenError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("message must not be empty")]
    EmptyMessage,
}

/// Errors raised by the emotion and generation backends.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Model returned no generated text")]
    EmptyResponse,

    #[error("Classifier returned no emotion scores")]
    EmptyClassification,

    #[error("Model file not found at {path}")]
    ModelNotFound { path: String },

    #[error("ONNX inference error: {0}")]
    OnnxInference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),
}
