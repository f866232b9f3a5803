//! Pairwise comparison of emotion records

use super::statistics::pearson;
use crate::types::{DetectorName, EmotionRecord};
use facet_common::numeric::round_to;
use serde::{Deserialize, Serialize};

/// Agreement between two emotion detectors on the same image
///
/// `first` precedes `second` in detector order, whichever order the records
/// were passed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseComparison {
    pub first: DetectorName,
    pub second: DetectorName,
    /// Both detectors chose the same dominant label
    pub emotion_agreement: bool,
    /// Pearson coefficient over common labels (3 decimals)
    pub correlation: Option<f64>,
    /// Two-tailed p-value of `correlation` (4 decimals)
    pub p_value: Option<f64>,
    /// |confidence(first) − confidence(second)| (2 decimals)
    pub confidence_difference: f64,
    /// Number of labels scored by both detectors
    pub common_labels: usize,
}

impl PairwiseComparison {
    /// Pair key in detector order, e.g. "fer_vs_deepface"
    pub fn key(&self) -> String {
        let (a, b) = if self.second < self.first {
            (self.second, self.first)
        } else {
            (self.first, self.second)
        };
        format!("{}_vs_{}", a, b)
    }
}

/// Compare two face-detected emotion records
pub fn compare_pair(first: &EmotionRecord, second: &EmotionRecord) -> PairwiseComparison {
    let (first, second) = if second.detector < first.detector {
        (second, first)
    } else {
        (first, second)
    };

    // Both maps iterate in canonical label order, so the samples line up
    let (xs, ys): (Vec<f64>, Vec<f64>) = first
        .emotions
        .iter()
        .filter_map(|(label, score)| second.emotions.get(label).map(|other| (*score, *other)))
        .unzip();

    let correlation = pearson(&xs, &ys);

    PairwiseComparison {
        first: first.detector,
        second: second.detector,
        emotion_agreement: first.dominant_emotion.is_some()
            && first.dominant_emotion == second.dominant_emotion,
        correlation: correlation.map(|c| round_to(c.coefficient, 3)),
        p_value: correlation.map(|c| round_to(c.p_value, 4)),
        confidence_difference: round_to(
            (first.confidence_score - second.confidence_score).abs(),
            2,
        ),
        common_labels: xs.len(),
    }
}

/// Compare every unordered pair, in request order
pub fn compare_all(records: &[&EmotionRecord]) -> Vec<PairwiseComparison> {
    let mut comparisons = Vec::new();
    for (i, first) in records.iter().enumerate() {
        for second in &records[i + 1..] {
            comparisons.push(compare_pair(first, second));
        }
    }
    comparisons
}
