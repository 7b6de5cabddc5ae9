pub mod config;
pub mod emotion;
pub mod error;
pub mod generation;
pub mod inference;
pub mod models;
pub mod onnx_classifier;
pub mod prompt;
pub mod transcript;

pub use config::HavenConfig;
pub use emotion::{dominant_emotion, EmotionClassifier, HttpEmotionClient};
pub use error::{HavenError, ModelError};
pub use generation::{GenerationBackend, HttpGenerationClient, QueryTruncator, SamplingParams};
pub use inference::InferenceConfig;
pub use models::{EmotionScore, Turn};
pub use onnx_classifier::OnnxEmotionClassifier;
pub use prompt::{clean_reply, dialogue_lines, HelpIntent, KeywordHelpIntent, PromptBuilder};
pub use transcript::TranscriptStore;
