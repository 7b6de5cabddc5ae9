use serde::{Deserialize, Serialize};

/// One `(label, score)` pair produced by an emotion classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub label: String,
    pub score: f32,
}

impl EmotionScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }

    /// Same label, score rounded to two decimal places.
    pub fn rounded(&self) -> Self {
        Self {
            label: self.label.clone(),
            score: round2(self.score),
        }
    }
}

/// Highest-scoring pair. Ties resolve to the earliest entry.
pub fn dominant(scores: &[EmotionScore]) -> Option<&EmotionScore> {
    scores.iter().fold(None, |best: Option<&EmotionScore>, s| match best {
        Some(b) if b.score >= s.score => Some(b),
        _ => Some(s),
    })
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}
