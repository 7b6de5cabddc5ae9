use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::prompt::DEFAULT_PERSONA;

pub const DEFAULT_EMOTION_MODEL: &str = "j-hartmann/emotion-english-distilroberta-base";
pub const DEFAULT_GENERATION_MODEL: &str = "microsoft/GODEL-v1_1-large-seq2seq";
pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HavenConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub emotion: EmotionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConversationConfig {
    /// Number of stored turns (user + bot pairs) fed back as context.
    pub context_window_turns: usize,
    /// Token budget the generation query is cut to before inference.
    pub max_input_tokens: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            context_window_turns: 4,
            max_input_tokens: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub persona: String,
    pub knowledge: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            knowledge: String::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmotionConfig {
    /// "http" or "onnx"
    pub backend: String,
    pub base_url: String,
    pub model: String,
    /// Directory holding model.onnx, tokenizer.json and config.json (onnx backend only)
    pub model_dir: String,
    pub timeout_seconds: u64,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            backend: "http".to_string(),
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            model: DEFAULT_EMOTION_MODEL.to_string(),
            model_dir: String::new(),
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: String,
    pub base_url: String,
    pub model: String,
    /// Optional tokenizer.json used to enforce `max_input_tokens` locally
    pub tokenizer_path: String,
    pub max_length: u32,
    pub min_length: u32,
    pub top_p: f32,
    pub do_sample: bool,
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: "http".to_string(),
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            tokenizer_path: String::new(),
            max_length: 200,
            min_length: 30,
            top_p: 0.9,
            do_sample: true,
            timeout_seconds: 120,
        }
    }
}

impl HavenConfig {
    /// Load from a TOML file, then apply `HAVEN__SECTION__KEY` overrides.
    ///
    /// Missing sections and keys fall back to their defaults.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("HAVEN").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
