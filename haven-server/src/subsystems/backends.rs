//! Backend factory — builds the emotion and generation models named in config.

use std::path::PathBuf;
use std::sync::Arc;

use haven_core::config::{EmotionConfig, GenerationConfig};
use haven_core::{
    EmotionClassifier, GenerationBackend, HttpEmotionClient, HttpGenerationClient,
    InferenceConfig, ModelError, OnnxEmotionClassifier, SamplingParams,
};

/// Create the emotion classifier selected by `[emotion] backend`.
pub fn create_classifier(
    config: &EmotionConfig,
) -> Result<Arc<dyn EmotionClassifier>, ModelError> {
    match config.backend.as_str() {
        "http" => {
            let mut inference = InferenceConfig::new(&config.base_url, &config.model);
            inference.timeout_seconds = config.timeout_seconds;
            Ok(Arc::new(HttpEmotionClient::new(inference)?))
        }
        "onnx" => {
            let dir = resolve_model_dir(&config.model_dir);
            Ok(Arc::new(OnnxEmotionClassifier::new(&dir)?))
        }
        other => Err(ModelError::UnknownBackend(other.to_string())),
    }
}

/// Create the generation backend selected by `[generation] backend`.
pub fn create_generator(
    config: &GenerationConfig,
) -> Result<Arc<dyn GenerationBackend>, ModelError> {
    match config.backend.as_str() {
        "http" => {
            let mut inference = InferenceConfig::new(&config.base_url, &config.model);
            inference.timeout_seconds = config.timeout_seconds;
            let params = SamplingParams {
                max_length: config.max_length,
                min_length: config.min_length,
                top_p: config.top_p,
                do_sample: config.do_sample,
                num_return_sequences: 1,
            };
            Ok(Arc::new(HttpGenerationClient::new(inference, params)?))
        }
        other => Err(ModelError::UnknownBackend(other.to_string())),
    }
}

/// Resolve the default classifier directory.
pub fn default_model_dir() -> PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share")
        });
    data_home.join("haven/models/emotion")
}

/// Empty config value means the default location.
pub fn resolve_model_dir(model_dir: &str) -> PathBuf {
    if model_dir.is_empty() {
        default_model_dir()
    } else {
        PathBuf::from(model_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_backends_from_default_config() {
        let classifier = create_classifier(&EmotionConfig::default()).unwrap();
        assert_eq!(classifier.name(), "http");
        let generator = create_generator(&GenerationConfig::default()).unwrap();
        assert_eq!(generator.name(), "http");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let config = EmotionConfig {
            backend: "carrier-pigeon".to_string(),
            ..EmotionConfig::default()
        };
        match create_classifier(&config) {
            Err(ModelError::UnknownBackend(name)) => assert_eq!(name, "carrier-pigeon"),
            Err(other) => panic!("Expected UnknownBackend, got {other}"),
            Ok(_) => panic!("Expected UnknownBackend, got a classifier"),
        }
    }

    #[test]
    fn test_onnx_backend_missing_model() {
        let config = EmotionConfig {
            backend: "onnx".to_string(),
            model_dir: "/nonexistent/haven-emotion".to_string(),
            ..EmotionConfig::default()
        };
        assert!(matches!(
            create_classifier(&config),
            Err(ModelError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_model_dir() {
        assert!(resolve_model_dir("")
            .to_string_lossy()
            .ends_with("haven/models/emotion"));
        assert_eq!(resolve_model_dir("/opt/emo"), PathBuf::from("/opt/emo"));
    }
}
