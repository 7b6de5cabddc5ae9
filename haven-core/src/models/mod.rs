pub mod emotion;
pub mod turn;

pub use emotion::EmotionScore;
pub use turn::Turn;
