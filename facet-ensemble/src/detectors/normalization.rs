//! Score normalization shared by emotion adapters
//!
//! Raw detector outputs disagree on label vocabulary and scale. Every emotion
//! adapter runs its scores through the same steps:
//!
//! 1. Remap raw labels onto [`EmotionLabel`] via the adapter's label table
//! 2. Rescale percentages: when the raw scores sum to more than
//!    [`PERCENTAGE_SUM_THRESHOLD`], every score is divided by 100
//! 3. Round to [`EMOTION_DECIMALS`] decimal places

use super::backend::RawDetection;
use crate::types::{DetectionFailure, DetectorName, EmotionLabel, EmotionRecord, EmotionScores};
use facet_common::numeric::round_to;
use std::collections::HashMap;
use tracing::debug;

/// Raw score sum above which scores are treated as percentages
pub const PERCENTAGE_SUM_THRESHOLD: f64 = 10.0;

/// Decimal places kept for emotion scores
pub const EMOTION_DECIMALS: u32 = 2;

/// Decimal places kept for AU intensities
pub const AU_DECIMALS: u32 = 3;

/// Raw label → canonical label table for one detector family
pub type LabelTable = &'static [(&'static str, EmotionLabel)];

/// Labels shared by FER and DeepFace that differ from the canonical vocabulary
pub const CLASSIFIER_LABELS: LabelTable = &[
    ("angry", EmotionLabel::Anger),
    ("happy", EmotionLabel::Happiness),
    ("sad", EmotionLabel::Sadness),
];

/// Map a raw label onto the canonical vocabulary
///
/// Labels missing from `table` pass through when they already name a
/// canonical label; anything else is dropped.
pub fn remap_label(raw: &str, table: LabelTable) -> Option<EmotionLabel> {
    let lower = raw.trim().to_lowercase();
    table
        .iter()
        .find(|(from, _)| *from == lower)
        .map(|(_, to)| *to)
        .or_else(|| lower.parse().ok())
}

/// True when raw scores look like percentages rather than probabilities
pub fn is_percentage_scale(raw: &HashMap<String, f64>) -> bool {
    raw.values().sum::<f64>() > PERCENTAGE_SUM_THRESHOLD
}

/// Remap, rescale and round raw classifier scores
///
/// Non-finite scores are discarded. When two raw labels collapse onto the
/// same canonical label, the larger score is kept.
pub fn normalize_emotion_scores(raw: &HashMap<String, f64>, table: LabelTable) -> EmotionScores {
    let divisor = if is_percentage_scale(raw) { 100.0 } else { 1.0 };
    let mut scores = EmotionScores::new();

    for (raw_label, raw_score) in raw {
        if !raw_score.is_finite() {
            continue;
        }
        let Some(label) = remap_label(raw_label, table) else {
            debug!(label = %raw_label, "Dropping unrecognized emotion label");
            continue;
        };
        let score = round_to((raw_score / divisor).clamp(0.0, 1.0), EMOTION_DECIMALS);
        scores
            .entry(label)
            .and_modify(|existing| *existing = existing.max(score))
            .or_insert(score);
    }

    scores
}

/// Normalize the primary face of a raw classifier detection into an [`EmotionRecord`]
pub fn emotion_record_from_raw(
    detector: DetectorName,
    raw: &RawDetection,
    table: LabelTable,
) -> Result<EmotionRecord, DetectionFailure> {
    let face = raw.primary_face().ok_or(DetectionFailure::NoFaceDetected)?;
    if face.scores.is_empty() {
        return Err(DetectionFailure::EmptyScores);
    }

    let emotions = normalize_emotion_scores(&face.scores, table);
    if emotions.is_empty() {
        return Err(DetectionFailure::EmptyScores);
    }

    Ok(EmotionRecord::from_scores(detector, emotions, face.face_box))
}

/// Highest-scoring label, ties broken by canonical label order
pub fn dominant_emotion(scores: &EmotionScores) -> Option<(EmotionLabel, f64)> {
    // BTreeMap iterates in canonical order; strict `>` keeps the earliest label on ties
    let mut best: Option<(EmotionLabel, f64)> = None;
    for (label, score) in scores {
        match best {
            Some((_, best_score)) if *score <= best_score => {}
            _ => best = Some((*label, *score)),
        }
    }
    best
}
