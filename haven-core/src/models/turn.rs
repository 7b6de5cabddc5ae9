use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EmotionScore;

/// One completed exchange: the user's message, its dominant emotion and the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub user_text: String,
    pub emotion_label: String,
    pub emotion_score: f32,
    pub bot_text: String,
    /// Server-local wall-clock time, truncated to the minute.
    pub timestamp: DateTime<Local>,
}

impl Turn {
    /// Build a turn stamped with the current minute.
    ///
    /// The emotion score is stored rounded to two decimals.
    pub fn new(user_text: impl Into<String>, emotion: &EmotionScore, bot_text: impl Into<String>) -> Self {
        let emotion = emotion.rounded();
        Self {
            id: Uuid::new_v4(),
            user_text: user_text.into(),
            emotion_label: emotion.label,
            emotion_score: emotion.score,
            bot_text: bot_text.into(),
            timestamp: truncate_to_minute(Local::now()),
        }
    }

    /// `YYYY-MM-DD HH:MM`
    pub fn timestamp_label(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M").to_string()
    }
}

fn truncate_to_minute(t: DateTime<Local>) -> DateTime<Local> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
