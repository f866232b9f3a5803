//! Delta Engine
//!
//! Compares a current action unit record against a person's baseline:
//! per-AU deltas, change classification, significant changes and movement
//! patterns. Pure functions; the calibration store supplies the baseline.

use crate::calibration::Baseline;
use crate::detectors::combinations::pair_mean;
use crate::types::{AuCode, DetectorRecord};
use chrono::{DateTime, Utc};
use facet_common::numeric::round_to;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// |delta| above which a change is reported as significant
pub const SIGNIFICANT_CHANGE_THRESHOLD: f64 = 0.2;

/// Magnitude class of one AU delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// |delta| < 0.1
    Minimal,
    /// 0.1 <= |delta| < 0.3
    Moderate,
    /// 0.3 <= |delta| < 0.5
    Significant,
    /// |delta| >= 0.5
    Major,
}

impl ChangeType {
    pub fn classify(delta: f64) -> Self {
        let magnitude = delta.abs();
        if magnitude < 0.1 {
            ChangeType::Minimal
        } else if magnitude < 0.3 {
            ChangeType::Moderate
        } else if magnitude < 0.5 {
            ChangeType::Significant
        } else {
            ChangeType::Major
        }
    }
}

/// Change of one AU relative to baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuDelta {
    /// current − baseline (3 decimals)
    pub delta: f64,
    pub baseline: f64,
    pub current: f64,
    pub description: String,
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificantChange {
    pub au: AuCode,
    pub delta: f64,
    pub description: String,
    pub change_type: ChangeType,
}

/// Recognized multi-AU movement relative to baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementPattern {
    pub pattern: String,
    pub description: String,
    pub intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaResult {
    pub baseline_timestamp: DateTime<Utc>,
    pub baseline_person: String,
    pub deltas: BTreeMap<AuCode, AuDelta>,
    /// Sorted by descending |delta|
    pub significant_changes: Vec<SignificantChange>,
    pub movement_patterns: Vec<MovementPattern>,
    /// Σ|delta| (2 decimals)
    pub total_movement: f64,
}

/// Outcome of a delta request
///
/// Missing baselines and invalid records are reported here, not as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaReport {
    pub has_baseline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub result: Option<DeltaResult>,
}

impl DeltaReport {
    pub fn no_baseline() -> Self {
        Self {
            has_baseline: false,
            error: Some("No baseline set".to_string()),
            result: None,
        }
    }

    pub fn invalid_record() -> Self {
        Self {
            has_baseline: true,
            error: Some("Invalid FACS result".to_string()),
            result: None,
        }
    }

    fn computed(result: DeltaResult) -> Self {
        Self {
            has_baseline: true,
            error: None,
            result: Some(result),
        }
    }
}

/// Compare `current` against `baseline`
///
/// `current` must be a face-detected action unit record; an empty AU map is
/// valid and means every baseline AU relaxed to zero.
pub fn calculate_delta(baseline: &Baseline, current: &DetectorRecord) -> DeltaReport {
    let Some(current) = current.as_action_units().filter(|r| r.face_detected) else {
        debug!(detector = %current.detector(), "Delta requested for unusable record");
        return DeltaReport::invalid_record();
    };

    let codes: BTreeSet<&AuCode> = baseline
        .action_units
        .keys()
        .chain(current.action_units.keys())
        .collect();

    let mut deltas = BTreeMap::new();
    for code in codes {
        let before = baseline.action_units.get(code);
        let after = current.action_units.get(code);

        let baseline_intensity = before.map(|au| au.intensity).unwrap_or(0.0);
        let current_intensity = after.map(|au| au.intensity).unwrap_or(0.0);
        let delta = round_to(current_intensity - baseline_intensity, 3);

        let description = after
            .or(before)
            .map(|au| au.description.clone())
            .unwrap_or_else(|| "Unknown AU".to_string());

        deltas.insert(
            code.clone(),
            AuDelta {
                delta,
                baseline: round_to(baseline_intensity, 3),
                current: round_to(current_intensity, 3),
                description,
                change_type: ChangeType::classify(delta),
            },
        );
    }

    let mut significant_changes: Vec<SignificantChange> = deltas
        .iter()
        .filter(|(_, d)| d.delta.abs() > SIGNIFICANT_CHANGE_THRESHOLD)
        .map(|(code, d)| SignificantChange {
            au: code.clone(),
            delta: d.delta,
            description: d.description.clone(),
            change_type: d.change_type,
        })
        .collect();
    // Stable sort keeps AU code order among equal magnitudes
    significant_changes.sort_by(|a, b| b.delta.abs().total_cmp(&a.delta.abs()));

    let movement_patterns = detect_movement_patterns(&deltas);
    let total_movement = round_to(deltas.values().map(|d| d.delta.abs()).sum(), 2);

    debug!(
        person_id = %baseline.person_id,
        aus = deltas.len(),
        significant = significant_changes.len(),
        patterns = movement_patterns.len(),
        "Delta calculated"
    );

    DeltaReport::computed(DeltaResult {
        baseline_timestamp: baseline.timestamp,
        baseline_person: baseline.person_id.clone(),
        deltas,
        significant_changes,
        movement_patterns,
        total_movement,
    })
}

fn pattern(name: &str, description: &str, intensity: f64) -> MovementPattern {
    MovementPattern {
        pattern: name.to_string(),
        description: description.to_string(),
        intensity,
    }
}

/// Detect smile, frown and brow movements in a delta map
pub fn detect_movement_patterns(deltas: &BTreeMap<AuCode, AuDelta>) -> Vec<MovementPattern> {
    let delta = |code: &str| deltas.get(code).map(|d| d.delta).unwrap_or(0.0);
    let mut patterns = Vec::new();

    let au12 = delta("AU12");
    let au06 = delta("AU06");
    if au12 > 0.3 {
        if au06 > 0.2 {
            patterns.push(pattern(
                "Duchenne Smile Development",
                "Both lip corners and eye muscles activated",
                pair_mean(au12, au06),
            ));
        } else {
            patterns.push(pattern(
                "Social Smile Development",
                "Lip corners activated without eye involvement",
                au12,
            ));
        }
    }

    let au15 = delta("AU15");
    let au04 = delta("AU04");
    if au15 > 0.3 || au04 > 0.3 {
        patterns.push(pattern(
            "Frown Development",
            "Brow lowering or lip corner depression",
            au15.max(au04),
        ));
    }

    let au01 = delta("AU01");
    let au02 = delta("AU02");
    if au01 > 0.2 && au02 > 0.2 {
        patterns.push(pattern(
            "Brow Flash",
            "Eyebrow raise movement",
            pair_mean(au01, au02),
        ));
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionUnit, ActionUnitRecord, DetectionFailure, DetectorName, EmotionRecord, EmotionScores};

    fn units(pairs: &[(&str, f64)]) -> BTreeMap<AuCode, ActionUnit> {
        pairs
            .iter()
            .map(|(code, intensity)| {
                (
                    code.to_string(),
                    ActionUnit {
                        intensity: *intensity,
                        description: format!("{} description", code),
                        muscle_group: String::new(),
                    },
                )
            })
            .collect()
    }

    fn baseline(pairs: &[(&str, f64)]) -> Baseline {
        let action_units = units(pairs);
        Baseline {
            person_id: "alice".to_string(),
            timestamp: Utc::now(),
            total_aus_detected: action_units.len(),
            action_units,
            analyzer: "FACS".to_string(),
            note: "Baseline set for alice".to_string(),
        }
    }

    fn current(pairs: &[(&str, f64)]) -> DetectorRecord {
        let action_units = units(pairs);
        DetectorRecord::ActionUnits(ActionUnitRecord {
            detector: DetectorName::Facs,
            face_detected: true,
            total_aus_detected: action_units.len(),
            action_units,
            combinations: vec![],
            active_aus: vec![],
            face_box: None,
            error: None,
        })
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(ChangeType::classify(0.099), ChangeType::Minimal);
        assert_eq!(ChangeType::classify(0.1), ChangeType::Moderate);
        assert_eq!(ChangeType::classify(-0.29), ChangeType::Moderate);
        assert_eq!(ChangeType::classify(0.3), ChangeType::Significant);
        assert_eq!(ChangeType::classify(0.4), ChangeType::Significant);
        assert_eq!(ChangeType::classify(-0.5), ChangeType::Major);
    }

    #[test]
    fn test_social_smile_development() {
        let report = calculate_delta(&baseline(&[("AU12", 0.2)]), &current(&[("AU12", 0.6)]));
        assert!(report.has_baseline);
        let result = report.result.unwrap();

        let au12 = &result.deltas["AU12"];
        assert_eq!(au12.delta, 0.4);
        assert_eq!(au12.baseline, 0.2);
        assert_eq!(au12.current, 0.6);
        assert_eq!(au12.change_type, ChangeType::Significant);

        assert_eq!(result.significant_changes.len(), 1);
        assert_eq!(result.significant_changes[0].au, "AU12");

        assert_eq!(result.movement_patterns.len(), 1);
        assert_eq!(result.movement_patterns[0].pattern, "Social Smile Development");
        assert_eq!(result.movement_patterns[0].intensity, 0.4);
        assert_eq!(result.total_movement, 0.4);
        assert_eq!(result.baseline_person, "alice");
    }

    #[test]
    fn test_duchenne_smile_development() {
        let report = calculate_delta(
            &baseline(&[("AU12", 0.1), ("AU06", 0.1)]),
            &current(&[("AU12", 0.6), ("AU06", 0.5)]),
        );
        let result = report.result.unwrap();

        assert_eq!(result.movement_patterns.len(), 1);
        assert_eq!(result.movement_patterns[0].pattern, "Duchenne Smile Development");
        assert_eq!(result.movement_patterns[0].intensity, 0.45);
    }

    #[test]
    fn test_union_of_codes_and_missing_side() {
        let report = calculate_delta(
            &baseline(&[("AU04", 0.5), ("AU01", 0.2)]),
            &current(&[("AU01", 0.25), ("AU15", 0.35)]),
        );
        let result = report.result.unwrap();

        assert_eq!(result.deltas.len(), 3);
        assert_eq!(result.deltas["AU04"].delta, -0.5);
        assert_eq!(result.deltas["AU04"].current, 0.0);
        assert_eq!(result.deltas["AU04"].description, "AU04 description");
        assert_eq!(result.deltas["AU15"].delta, 0.35);
        assert_eq!(result.deltas["AU01"].change_type, ChangeType::Minimal);

        let order: Vec<&str> = result.significant_changes.iter().map(|c| c.au.as_str()).collect();
        assert_eq!(order, vec!["AU04", "AU15"]);

        assert_eq!(result.movement_patterns.len(), 1);
        assert_eq!(result.movement_patterns[0].pattern, "Frown Development");
        assert_eq!(result.movement_patterns[0].intensity, 0.35);

        assert_eq!(result.total_movement, 0.9);
    }

    #[test]
    fn test_brow_flash_development() {
        let report = calculate_delta(
            &baseline(&[("AU01", 0.1), ("AU02", 0.1)]),
            &current(&[("AU01", 0.4), ("AU02", 0.5)]),
        );
        let result = report.result.unwrap();
        assert_eq!(result.movement_patterns[0].pattern, "Brow Flash");
        assert_eq!(result.movement_patterns[0].intensity, 0.35);
    }

    #[test]
    fn test_identical_measurements_have_no_movement() {
        let report = calculate_delta(&baseline(&[("AU12", 0.3)]), &current(&[("AU12", 0.3)]));
        let result = report.result.unwrap();

        assert_eq!(result.total_movement, 0.0);
        assert!(result.significant_changes.is_empty());
        assert!(result.movement_patterns.is_empty());
    }

    #[test]
    fn test_invalid_records() {
        let base = baseline(&[("AU12", 0.3)]);

        let no_face = DetectorRecord::failed(DetectorName::Facs, &DetectionFailure::NoFaceDetected);
        let report = calculate_delta(&base, &no_face);
        assert!(report.has_baseline);
        assert_eq!(report.error.as_deref(), Some("Invalid FACS result"));
        assert!(report.result.is_none());

        let emotion = DetectorRecord::Emotion(EmotionRecord::from_scores(
            DetectorName::Fer,
            EmotionScores::new(),
            None,
        ));
        assert_eq!(calculate_delta(&base, &emotion), DeltaReport::invalid_record());
    }

    #[test]
    fn test_report_serialization_is_flat() {
        let report = calculate_delta(&baseline(&[("AU12", 0.2)]), &current(&[("AU12", 0.6)]));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["has_baseline"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["baseline_person"], "alice");
        assert_eq!(json["deltas"]["AU12"]["change_type"], "significant");

        let json = serde_json::to_value(DeltaReport::no_baseline()).unwrap();
        assert_eq!(json["has_baseline"], false);
        assert_eq!(json["error"], "No baseline set");
    }
}
