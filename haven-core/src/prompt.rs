//! Prompt assembly for the therapist persona.
//!
//! Dialogue lines are joined with the ` EOS ` separator the seq2seq model was
//! trained on, prefixed with the persona instruction and an optional
//! `[KNOWLEDGE]` block. Help-seeking messages get an extra directive asking for
//! concrete coping strategies.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::models::Turn;

pub const DEFAULT_PERSONA: &str = concat!(
    "Do not include role labels like 'Therapist:' or 'User:' in your responses.",
    "Instruction: You are a compassionate, professional therapist. ",
    "Listen carefully, validate emotions, and offer supportive guidance. ",
    "Always give at least 3 clear, practical coping strategies or exercises that the user can try immediately. ",
    "Avoid repeating the same phrase more than once in a reply. ",
    "Write in short, encouraging sentences. ",
    "Do not give medical or legal advice; encourage seeking a professional when appropriate. ",
);

pub const EOS_SEPARATOR: &str = " EOS ";

pub const COPING_DIRECTIVE: &str =
    " Please respond with 3-5 specific, actionable coping strategies, each in a separate bullet point.";

pub const HELP_KEYWORDS: &[&str] = &[
    "how",
    "what can i do",
    "any tips",
    "suggest",
    "help me",
    "manage",
    "cope",
];

pub const USER_LABEL: &str = "User:";
pub const THERAPIST_LABEL: &str = "Therapist:";

// ============================================================================
// Help-intent detection
// ============================================================================

/// Decides whether an utterance is asking for help.
pub trait HelpIntent: Send + Sync {
    fn is_help_seeking(&self, utterance: &str) -> bool;
}

/// Case-insensitive substring match against a fixed keyword list.
#[derive(Debug, Clone)]
pub struct KeywordHelpIntent {
    keywords: Vec<String>,
}

impl KeywordHelpIntent {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
        }
    }
}

impl Default for KeywordHelpIntent {
    fn default() -> Self {
        Self::new(HELP_KEYWORDS.iter().copied())
    }
}

impl HelpIntent for KeywordHelpIntent {
    fn is_help_seeking(&self, utterance: &str) -> bool {
        let lowered = utterance.to_lowercase();
        self.keywords.iter().any(|kw| lowered.contains(kw.as_str()))
    }
}

// ============================================================================
// PromptBuilder
// ============================================================================

#[derive(Clone)]
pub struct PromptBuilder {
    persona: String,
    intent: Arc<dyn HelpIntent>,
}

impl std::fmt::Debug for PromptBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptBuilder")
            .field("persona_len", &self.persona.len())
            .finish_non_exhaustive()
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA)
    }
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            intent: Arc::new(KeywordHelpIntent::default()),
        }
    }

    /// Swap the help-intent predicate.
    pub fn with_intent(mut self, intent: Arc<dyn HelpIntent>) -> Self {
        self.intent = intent;
        self
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Build the generation query from labelled dialogue lines.
    ///
    /// `lines` are expected oldest-first with the new user line last. An empty
    /// `knowledge` string omits the `[KNOWLEDGE]` block entirely.
    pub fn build_query<S: AsRef<str>>(&self, lines: &[S], knowledge: &str) -> String {
        let dialogue = lines
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(EOS_SEPARATOR);

        let knowledge_part = if knowledge.is_empty() {
            String::new()
        } else {
            format!("[KNOWLEDGE] {knowledge}")
        };

        let mut query = format!("{} [CONTEXT] {} {}", self.persona, dialogue, knowledge_part);

        let last_utterance = lines.last().map(AsRef::as_ref).unwrap_or("");
        if self.intent.is_help_seeking(last_utterance) {
            query.push_str(COPING_DIRECTIVE);
        }

        query
    }
}

/// Label the stored window and the new message as alternating dialogue lines.
pub fn dialogue_lines(window: &[Turn], new_message: &str) -> Vec<String> {
    let mut lines = Vec::with_capacity(window.len() * 2 + 1);
    for turn in window {
        lines.push(format!("{USER_LABEL} {}", turn.user_text));
        lines.push(format!("{THERAPIST_LABEL} {}", turn.bot_text));
    }
    lines.push(format!("{USER_LABEL} {new_message}"));
    lines
}

static ROLE_LABELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Therapist|User):[ \t]*").expect("role label pattern is valid")
});

/// Remove exact-case role labels the model echoed back, then trim.
///
/// Spaces and tabs immediately following a label go with it; line breaks stay,
/// so bulleted replies keep one item per line. Other casings (`user:`,
/// `THERAPIST:`) are left alone.
pub fn clean_reply(raw: &str) -> String {
    ROLE_LABELS.replace_all(raw, "").trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
