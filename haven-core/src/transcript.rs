use std::collections::HashMap;

use crate::models::Turn;

/// In-memory, append-only conversation history (oldest first).
///
/// The store lives as long as its owner; nothing is persisted.
#[derive(Debug, Default, Clone)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The last `n` turns, oldest first. Shorter histories return everything.
    pub fn recent_window(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Drops every turn and returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.turns.len();
        self.turns.clear();
        removed
    }

    /// Number of turns per emotion label over the whole transcript.
    pub fn emotion_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for turn in &self.turns {
            *counts.entry(turn.emotion_label.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmotionScore;

    fn turn(i: usize, label: &str) -> Turn {
        Turn::new(format!("message {i}"), &EmotionScore::new(label, 0.5), format!("reply {i}"))
    }

    #[test]
    fn test_recent_window_returns_trailing_turns_oldest_first() {
        let mut store = TranscriptStore::new();
        for i in 1..=10 {
            store.append(turn(i, "neutral"));
        }
        let window = store.recent_window(4);
        let texts: Vec<&str> = window.iter().map(|t| t.user_text.as_str()).collect();
        assert_eq!(texts, vec!["message 7", "message 8", "message 9", "message 10"]);
    }

    #[test]
    fn test_recent_window_shorter_history() {
        let mut store = TranscriptStore::new();
        store.append(turn(1, "joy"));
        store.append(turn(2, "joy"));
        assert_eq!(store.recent_window(4).len(), 2);
        assert!(store.recent_window(0).is_empty());
    }

    #[test]
    fn test_emotion_counts_over_full_transcript() {
        let mut store = TranscriptStore::new();
        for (i, label) in ["joy", "joy", "sadness"].iter().enumerate() {
            store.append(turn(i, label));
        }
        let counts = store.emotion_counts();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["joy"], 2);
        assert_eq!(counts["sadness"], 1);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut store = TranscriptStore::new();
        for i in 0..5 {
            store.append(turn(i, "fear"));
        }
        assert_eq!(store.clear(), 5);
        assert!(store.is_empty());
        assert!(store.recent_window(3).is_empty());
        assert!(store.emotion_counts().is_empty());
    }
}
