//! Chat subsystem — runs one exchange end to end
//!
//! emotion scoring → prompt build over the stored window → truncation →
//! generation → reply cleanup → transcript append.
//!
//! The transcript lock is held for the whole exchange, so concurrent requests
//! are processed one at a time and every prompt sees the transcript exactly as
//! it stood before its own turn.

use std::collections::HashMap;
use std::sync::Arc;

use haven_core::{
    clean_reply, dialogue_lines, dominant_emotion, EmotionClassifier, GenerationBackend,
    HavenConfig, HavenError, ModelError, PromptBuilder, QueryTruncator, TranscriptStore, Turn,
};
use tokio::sync::Mutex;

pub struct ChatService {
    transcript: Mutex<TranscriptStore>,
    classifier: Arc<dyn EmotionClassifier>,
    generator: Arc<dyn GenerationBackend>,
    prompt: PromptBuilder,
    truncator: QueryTruncator,
    context_window_turns: usize,
    knowledge: String,
}

impl ChatService {
    pub fn new(
        classifier: Arc<dyn EmotionClassifier>,
        generator: Arc<dyn GenerationBackend>,
        prompt: PromptBuilder,
        truncator: QueryTruncator,
        context_window_turns: usize,
    ) -> Self {
        Self {
            transcript: Mutex::new(TranscriptStore::new()),
            classifier,
            generator,
            prompt,
            truncator,
            context_window_turns,
            knowledge: String::new(),
        }
    }

    /// Wire a service from config, loading the truncation tokenizer if one is set.
    pub fn from_config(
        config: &HavenConfig,
        classifier: Arc<dyn EmotionClassifier>,
        generator: Arc<dyn GenerationBackend>,
    ) -> Result<Self, ModelError> {
        let truncator = QueryTruncator::from_path(
            &config.generation.tokenizer_path,
            config.conversation.max_input_tokens,
        )?;
        if config.generation.tokenizer_path.is_empty() {
            tracing::warn!(
                max_input_tokens = config.conversation.max_input_tokens,
                "No generation tokenizer_path configured; queries are sent untruncated"
            );
        }
        let mut service = Self::new(
            classifier,
            generator,
            PromptBuilder::new(config.prompt.persona.clone()),
            truncator,
            config.conversation.context_window_turns,
        );
        service.knowledge = config.prompt.knowledge.clone();
        Ok(service)
    }

    /// Process one user message and record the resulting turn.
    ///
    /// `knowledge` overrides the configured default for this exchange only.
    /// Model failures propagate and leave the transcript untouched.
    pub async fn send(&self, message: &str, knowledge: Option<&str>) -> Result<Turn, HavenError> {
        if message.trim().is_empty() {
            return Err(HavenError::EmptyMessage);
        }

        let mut transcript = self.transcript.lock().await;

        let emotion = dominant_emotion(self.classifier.as_ref(), message).await?;

        let lines = dialogue_lines(transcript.recent_window(self.context_window_turns), message);
        let knowledge = knowledge.unwrap_or(self.knowledge.as_str());
        let query = self.prompt.build_query(&lines, knowledge);
        let query = self.truncator.truncate(&query)?;

        let raw = self.generator.generate(query).await?;
        let reply = clean_reply(&raw);

        let turn = Turn::new(message, &emotion, reply);
        transcript.append(turn.clone());

        tracing::info!(
            label = %turn.emotion_label,
            score = turn.emotion_score,
            context_lines = lines.len(),
            turns = transcript.len(),
            "Recorded chat turn"
        );

        Ok(turn)
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.transcript.lock().await.turns().to_vec()
    }

    pub async fn emotion_counts(&self) -> HashMap<String, usize> {
        self.transcript.lock().await.emotion_counts()
    }

    pub async fn turn_count(&self) -> usize {
        self.transcript.lock().await.len()
    }

    /// Clear the transcript, returning how many turns were dropped.
    pub async fn reset(&self) -> usize {
        let removed = self.transcript.lock().await.clear();
        tracing::info!(removed, "Transcript cleared");
        removed
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use haven_core::prompt::COPING_DIRECTIVE;
    use haven_core::EmotionScore;

    /// Labels "sadness" when the text mentions "sad", "joy" otherwise.
    struct KeywordClassifier;

    #[async_trait]
    impl EmotionClassifier for KeywordClassifier {
        async fn classify(&self, text: &str) -> Result<Vec<EmotionScore>, ModelError> {
            if text.contains("sad") {
                Ok(vec![EmotionScore::new("joy", 0.1), EmotionScore::new("sadness", 0.876)])
            } else {
                Ok(vec![EmotionScore::new("joy", 0.912), EmotionScore::new("sadness", 0.05)])
            }
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    /// Records every query and answers with a label-leaking reply.
    #[derive(Default)]
    struct RecordingGenerator {
        queries: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationBackend for RecordingGenerator {
        async fn generate(&self, query: &str) -> Result<String, ModelError> {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.to_string());
            Ok(format!("Therapist: reply {}", queries.len()))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl GenerationBackend for FailingGenerator {
        async fn generate(&self, _query: &str) -> Result<String, ModelError> {
            Err(ModelError::Api {
                code: 503,
                message: "model overloaded".to_string(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn service(generator: Arc<dyn GenerationBackend>, window: usize) -> ChatService {
        ChatService::new(
            Arc::new(KeywordClassifier),
            generator,
            PromptBuilder::default(),
            QueryTruncator::passthrough(1024),
            window,
        )
    }

    #[tokio::test]
    async fn test_send_records_cleaned_turn() {
        let chat = service(Arc::new(RecordingGenerator::default()), 4);
        let turn = chat.send("I feel sad today", None).await.unwrap();

        assert_eq!(turn.user_text, "I feel sad today");
        assert_eq!(turn.emotion_label, "sadness");
        assert!((turn.emotion_score - 0.88).abs() < 1e-6);
        assert_eq!(turn.bot_text, "reply 1");
        assert_eq!(chat.turn_count().await, 1);
    }

    #[tokio::test]
    async fn test_prompt_uses_window_before_current_turn() {
        let generator = Arc::new(RecordingGenerator::default());
        let chat = service(generator.clone(), 2);

        for msg in ["first", "second", "third", "fourth"] {
            chat.send(msg, None).await.unwrap();
        }

        let queries = generator.queries.lock().unwrap();
        assert_eq!(queries.len(), 4);
        assert!(queries[0].ends_with("[CONTEXT] User: first "));
        let last = &queries[3];
        assert!(last.contains(
            "[CONTEXT] User: second EOS Therapist: reply 2 EOS User: third EOS Therapist: reply 3 EOS User: fourth"
        ));
        assert!(!last.contains("User: first"));
    }

    #[tokio::test]
    async fn test_help_request_gets_directive() {
        let generator = Arc::new(RecordingGenerator::default());
        let chat = service(generator.clone(), 4);
        chat.send("What can I do to relax?", None).await.unwrap();
        assert!(generator.queries.lock().unwrap()[0].ends_with(COPING_DIRECTIVE));
    }

    #[tokio::test]
    async fn test_knowledge_override() {
        let generator = Arc::new(RecordingGenerator::default());
        let chat = service(generator.clone(), 4);
        chat.send("hello", Some("anxiety")).await.unwrap();
        assert!(generator.queries.lock().unwrap()[0].ends_with("User: hello [KNOWLEDGE] anxiety"));
    }

    const WORD_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": { "[UNK]": 0, "cope": 1 },
            "unk_token": "[UNK]"
        }
    }"#;

    #[tokio::test]
    async fn test_query_cut_to_token_budget_before_generation() {
        let generator = Arc::new(RecordingGenerator::default());
        // "Listen" "." "[" "CONTEXT" "]" "User" ":" "how" "can" "I" "cope" = 11 tokens
        let chat = ChatService::new(
            Arc::new(KeywordClassifier),
            generator.clone(),
            PromptBuilder::new("Listen."),
            QueryTruncator::from_json(WORD_TOKENIZER, 11).unwrap(),
            4,
        );

        chat.send("how can I cope", None).await.unwrap();

        let queries = generator.queries.lock().unwrap();
        assert_eq!(queries[0], "Listen. [CONTEXT] User: how can I cope");
        assert!(!queries[0].contains("Please respond"));
    }

    #[tokio::test]
    async fn test_query_within_budget_keeps_directive() {
        let generator = Arc::new(RecordingGenerator::default());
        let chat = ChatService::new(
            Arc::new(KeywordClassifier),
            generator.clone(),
            PromptBuilder::new("Listen."),
            QueryTruncator::from_json(WORD_TOKENIZER, 1024).unwrap(),
            4,
        );

        chat.send("how can I cope", None).await.unwrap();
        assert!(generator.queries.lock().unwrap()[0].ends_with(COPING_DIRECTIVE));
    }

    #[tokio::test]
    async fn test_failed_generation_records_nothing() {
        let chat = service(Arc::new(FailingGenerator), 4);
        let result = chat.send("hello", None).await;
        assert!(matches!(result, Err(HavenError::Model(ModelError::Api { code: 503, .. }))));
        assert_eq!(chat.turn_count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let chat = service(Arc::new(RecordingGenerator::default()), 4);
        assert!(matches!(chat.send("   ", None).await, Err(HavenError::EmptyMessage)));
    }

    #[tokio::test]
    async fn test_counts_and_reset() {
        let chat = service(Arc::new(RecordingGenerator::default()), 4);
        chat.send("great news", None).await.unwrap();
        chat.send("so good", None).await.unwrap();
        chat.send("a sad story", None).await.unwrap();

        let counts = chat.emotion_counts().await;
        assert_eq!(counts["joy"], 2);
        assert_eq!(counts["sadness"], 1);

        assert_eq!(chat.reset().await, 3);
        assert!(chat.history().await.is_empty());
        assert!(chat.emotion_counts().await.is_empty());
    }
}
