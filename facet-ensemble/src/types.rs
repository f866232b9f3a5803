//! Core Types for FACET
//!
//! Canonical record shapes every detector adapter normalizes into:
//! - **EmotionRecord:** emotion label → intensity, dominant label, confidence
//! - **ActionUnitRecord:** AU code → {intensity, description, muscle group}
//!
//! Failed detections keep the same shapes with `face_detected = false` and an
//! attached error description, so a failure never escapes an adapter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// FACS action unit code (e.g., "AU12")
pub type AuCode = String;

/// Emotion scores keyed by label, iterated in canonical label order
pub type EmotionScores = BTreeMap<EmotionLabel, f64>;

// ============================================================================
// Emotion labels
// ============================================================================

/// Closed emotion vocabulary shared by all emotion detectors
///
/// Variant order is the canonical label order. It is used for every argmax
/// tie-break, so two detectors reporting identical scores always agree on the
/// dominant label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Anger,
    Disgust,
    Fear,
    Happiness,
    Sadness,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    /// All labels in canonical order
    pub const CANONICAL_ORDER: [EmotionLabel; 7] = [
        EmotionLabel::Anger,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happiness,
        EmotionLabel::Sadness,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Anger => "anger",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happiness => "happiness",
            EmotionLabel::Sadness => "sadness",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = String;

    /// Parse a canonical label name (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        EmotionLabel::CANONICAL_ORDER
            .iter()
            .copied()
            .find(|label| label.as_str() == lower)
            .ok_or_else(|| format!("Unknown emotion label: {}", s))
    }
}

// ============================================================================
// Detector names
// ============================================================================

/// What a detector measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    /// Emotion classifier (label → score)
    Emotion,
    /// FACS action unit detector (AU → intensity)
    ActionUnit,
}

/// Closed set of detector backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorName {
    /// FER emotion classifier
    Fer,
    /// DeepFace emotion classifier
    DeepFace,
    /// Model-based FACS action unit detector
    Facs,
    /// Approximation-based FACS action unit detector
    SimpleFacs,
}

impl DetectorName {
    pub const ALL: [DetectorName; 4] = [
        DetectorName::Fer,
        DetectorName::DeepFace,
        DetectorName::Facs,
        DetectorName::SimpleFacs,
    ];

    /// Lowercase key used in requests and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorName::Fer => "fer",
            DetectorName::DeepFace => "deepface",
            DetectorName::Facs => "facs",
            DetectorName::SimpleFacs => "simplefacs",
        }
    }

    /// Human-readable backend name
    pub fn display_name(&self) -> &'static str {
        match self {
            DetectorName::Fer => "FER",
            DetectorName::DeepFace => "DeepFace",
            DetectorName::Facs => "FACS",
            DetectorName::SimpleFacs => "SimpleFACS",
        }
    }

    pub fn kind(&self) -> DetectorKind {
        match self {
            DetectorName::Fer | DetectorName::DeepFace => DetectorKind::Emotion,
            DetectorName::Facs | DetectorName::SimpleFacs => DetectorKind::ActionUnit,
        }
    }
}

impl fmt::Display for DetectorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        DetectorName::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == lower)
            .ok_or_else(|| {
                let known: Vec<&str> = DetectorName::ALL.iter().map(|n| n.as_str()).collect();
                format!("Unknown detector: {}. Available: {}", s, known.join(", "))
            })
    }
}

// ============================================================================
// Records
// ============================================================================

/// Face bounding box in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Normalized emotion classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    /// Detector that produced this record
    pub detector: DetectorName,
    /// False when the detector failed or found no usable face
    pub face_detected: bool,
    /// Label → score in [0, 1]; empty when no face was detected
    pub emotions: EmotionScores,
    /// Argmax of `emotions` (canonical tie-break); absent when `emotions` is empty
    pub dominant_emotion: Option<EmotionLabel>,
    /// Score of the dominant label
    pub confidence_score: f64,
    /// Face bounding box reported by the detector
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub face_box: Option<FaceBox>,
    /// Failure description when `face_detected` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmotionRecord {
    /// Build a successful record; dominant label and confidence are derived from `emotions`
    pub fn from_scores(
        detector: DetectorName,
        emotions: EmotionScores,
        face_box: Option<FaceBox>,
    ) -> Self {
        let dominant = crate::detectors::normalization::dominant_emotion(&emotions);
        Self {
            detector,
            face_detected: true,
            dominant_emotion: dominant.map(|(label, _)| label),
            confidence_score: dominant.map(|(_, score)| score).unwrap_or(0.0),
            emotions,
            face_box,
            error: None,
        }
    }

    /// Build a failed record carrying `failure` as its error description
    pub fn failed(detector: DetectorName, failure: &DetectionFailure) -> Self {
        Self {
            detector,
            face_detected: false,
            emotions: EmotionScores::new(),
            dominant_emotion: None,
            confidence_score: 0.0,
            face_box: None,
            error: Some(failure.describe(detector)),
        }
    }
}

/// One detected action unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionUnit {
    /// Activation intensity in [0, 1]
    pub intensity: f64,
    pub description: String,
    pub muscle_group: String,
}

/// Known combination of action units present in one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacsCombination {
    pub pattern: String,
    #[serde(rename = "aus")]
    pub member_aus: Vec<AuCode>,
    pub description: String,
    /// Mean of member intensities
    pub intensity: f64,
}

/// Normalized FACS detector output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionUnitRecord {
    pub detector: DetectorName,
    pub face_detected: bool,
    /// AUs above the detector's inclusion threshold
    pub action_units: BTreeMap<AuCode, ActionUnit>,
    #[serde(rename = "facs_combinations", default)]
    pub combinations: Vec<FacsCombination>,
    pub total_aus_detected: usize,
    /// [`ActionUnitRecord::active_summary`] at extraction time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_aus: Vec<String>,
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub face_box: Option<FaceBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Intensity above which an AU is listed by [`ActionUnitRecord::active_summary`]
pub const ACTIVE_AU_THRESHOLD: f64 = 0.3;

impl ActionUnitRecord {
    pub fn failed(detector: DetectorName, failure: &DetectionFailure) -> Self {
        Self {
            detector,
            face_detected: false,
            action_units: BTreeMap::new(),
            combinations: Vec::new(),
            total_aus_detected: 0,
            active_aus: Vec::new(),
            face_box: None,
            error: Some(failure.describe(detector)),
        }
    }

    /// Human-readable list of clearly active AUs, e.g. "Lip Corner Puller (AU12): 0.62"
    pub fn active_summary(&self) -> Vec<String> {
        self.action_units
            .iter()
            .filter(|(_, au)| au.intensity > ACTIVE_AU_THRESHOLD)
            .map(|(code, au)| format!("{} ({}): {:.2}", au.description, code, au.intensity))
            .collect()
    }
}

/// Output of one detector adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "analysis_type")]
pub enum DetectorRecord {
    #[serde(rename = "emotion")]
    Emotion(EmotionRecord),
    #[serde(rename = "pure_facs")]
    ActionUnits(ActionUnitRecord),
}

impl DetectorRecord {
    /// Failed record in the shape matching the detector's kind
    pub fn failed(detector: DetectorName, failure: &DetectionFailure) -> Self {
        match detector.kind() {
            DetectorKind::Emotion => DetectorRecord::Emotion(EmotionRecord::failed(detector, failure)),
            DetectorKind::ActionUnit => {
                DetectorRecord::ActionUnits(ActionUnitRecord::failed(detector, failure))
            }
        }
    }

    pub fn detector(&self) -> DetectorName {
        match self {
            DetectorRecord::Emotion(r) => r.detector,
            DetectorRecord::ActionUnits(r) => r.detector,
        }
    }

    pub fn face_detected(&self) -> bool {
        match self {
            DetectorRecord::Emotion(r) => r.face_detected,
            DetectorRecord::ActionUnits(r) => r.face_detected,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DetectorRecord::Emotion(r) => r.error.as_deref(),
            DetectorRecord::ActionUnits(r) => r.error.as_deref(),
        }
    }

    pub fn as_emotion(&self) -> Option<&EmotionRecord> {
        match self {
            DetectorRecord::Emotion(r) => Some(r),
            DetectorRecord::ActionUnits(_) => None,
        }
    }

    pub fn as_action_units(&self) -> Option<&ActionUnitRecord> {
        match self {
            DetectorRecord::Emotion(_) => None,
            DetectorRecord::ActionUnits(r) => Some(r),
        }
    }
}

// ============================================================================
// Detection failures
// ============================================================================

/// Why a detector produced no usable record
///
/// Never propagated out of an adapter; converted into a failed record by
/// [`crate::detectors::guarded_detect`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectionFailure {
    /// Underlying model or executable is not installed/configured
    #[error("not available: {0}")]
    DetectorUnavailable(String),

    /// Detector ran but found no usable face
    #[error("No face detected")]
    NoFaceDetected,

    /// Detector returned an empty score mapping
    #[error("No scores detected")]
    EmptyScores,

    /// Image missing or unreadable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Detector raised or returned malformed output
    #[error("error analyzing image: {0}")]
    BackendFailed(String),
}

impl DetectionFailure {
    /// Error text attached to failed records, prefixed with the detector's display name
    /// where the failure originates inside the detector
    pub fn describe(&self, detector: DetectorName) -> String {
        match self {
            DetectionFailure::DetectorUnavailable(_) | DetectionFailure::BackendFailed(_) => {
                format!("{} {}", detector.display_name(), self)
            }
            _ => self.to_string(),
        }
    }
}
