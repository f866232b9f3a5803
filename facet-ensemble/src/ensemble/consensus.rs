//! Consensus over dominant emotion labels

use crate::types::{DetectorName, EmotionLabel, EmotionRecord};
use facet_common::numeric::round_to;
use serde::{Deserialize, Serialize};

/// Confidence tier of a consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusConfidence {
    /// Every participant chose the same label
    High,
    /// Winning label chosen by more than half of the participants
    Medium,
    Low,
}

/// Ensemble-level agreed-upon dominant emotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub emotion: EmotionLabel,
    pub unanimous: bool,
    /// Winning count / participant count (2 decimals)
    pub agreement_ratio: f64,
    pub confidence: ConsensusConfidence,
    /// Detectors whose dominant label was counted, in request order
    pub participants: Vec<DetectorName>,
}

/// Reduce dominant labels to a consensus
///
/// Records without a dominant label do not participate. Ties between equally
/// frequent labels go to the label encountered first in `records` order.
pub fn build_consensus(records: &[&EmotionRecord]) -> Option<Consensus> {
    let votes: Vec<(DetectorName, EmotionLabel)> = records
        .iter()
        .filter_map(|r| r.dominant_emotion.map(|label| (r.detector, label)))
        .collect();

    let first_label = votes.first()?.1;
    let participants: Vec<DetectorName> = votes.iter().map(|(name, _)| *name).collect();
    let total = votes.len();

    // (label, count) in first-encountered order
    let mut tally: Vec<(EmotionLabel, usize)> = Vec::new();
    for (_, label) in &votes {
        match tally.iter_mut().find(|(l, _)| l == label) {
            Some((_, count)) => *count += 1,
            None => tally.push((*label, 1)),
        }
    }

    let (emotion, count) = tally
        .iter()
        .fold((first_label, 0), |best, &(label, count)| {
            if count > best.1 {
                (label, count)
            } else {
                best
            }
        });

    let unanimous = count == total;
    let confidence = if unanimous {
        ConsensusConfidence::High
    } else if count * 2 > total {
        ConsensusConfidence::Medium
    } else {
        ConsensusConfidence::Low
    };

    Some(Consensus {
        emotion,
        unanimous,
        agreement_ratio: round_to(count as f64 / total as f64, 2),
        confidence,
        participants,
    })
}
