use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmotionTally {
    pub label: String,
    pub count: usize,
    /// Share of all turns, 0.0–100.0
    pub percent: f64,
}

/// Emotion counts ready for display: largest first, ties by label.
#[derive(Debug, Clone, Serialize, Default)]
pub struct EmotionReport {
    pub tallies: Vec<EmotionTally>,
    pub total: usize,
}

impl EmotionReport {
    pub fn from_counts(counts: HashMap<String, usize>) -> Self {
        let total: usize = counts.values().sum();
        let mut tallies: Vec<EmotionTally> = counts
            .into_iter()
            .map(|(label, count)| EmotionTally {
                percent: if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                },
                label,
                count,
            })
            .collect();
        tallies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        Self { tallies, total }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sorted_by_count_then_label() {
        let counts = HashMap::from([
            ("sadness".to_string(), 1),
            ("joy".to_string(), 2),
            ("anger".to_string(), 1),
        ]);
        let report = EmotionReport::from_counts(counts);
        let labels: Vec<&str> = report.tallies.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["joy", "anger", "sadness"]);
        assert_eq!(report.total, 4);
        assert!((report.tallies[0].percent - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_report() {
        let report = EmotionReport::from_counts(HashMap::new());
        assert!(report.is_empty());
        assert!(report.tallies.is_empty());
    }
}
