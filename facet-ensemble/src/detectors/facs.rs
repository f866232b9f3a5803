//! Model-based FACS adapter
//!
//! Also hosts the AU record builder shared with [`super::simple_facs`]: AU
//! columns are canonicalized ("AU1" → "AU01"), filtered by the adapter's
//! inclusion threshold, rounded, annotated from the catalog, and scanned for
//! known combinations.

use super::au_catalog;
use super::backend::{DetectorBackend, RawDetection};
use super::combinations::detect_combinations;
use super::normalization::AU_DECIMALS;
use super::Detector;
use crate::types::{ActionUnit, ActionUnitRecord, DetectionFailure, DetectorName, DetectorRecord};
use async_trait::async_trait;
use facet_common::numeric::round_to;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// AUs at or below this intensity are dropped by the model-based detector
pub const FACS_INCLUSION_THRESHOLD: f64 = 0.1;

/// Build an [`ActionUnitRecord`] from the primary face of a raw AU detection
pub fn action_unit_record_from_raw(
    detector: DetectorName,
    raw: &RawDetection,
    threshold: f64,
) -> Result<ActionUnitRecord, DetectionFailure> {
    let face = raw.primary_face().ok_or(DetectionFailure::NoFaceDetected)?;
    if face.scores.is_empty() {
        return Err(DetectionFailure::EmptyScores);
    }

    let mut action_units: BTreeMap<String, ActionUnit> = BTreeMap::new();
    for (column, value) in &face.scores {
        let Some(code) = au_catalog::canonical_code(column) else {
            continue;
        };
        if !value.is_finite() || *value <= threshold {
            continue;
        }

        let intensity = round_to(value.clamp(0.0, 1.0), AU_DECIMALS);
        if action_units
            .get(&code)
            .is_some_and(|existing| existing.intensity >= intensity)
        {
            continue;
        }

        action_units.insert(
            code.clone(),
            ActionUnit {
                intensity,
                description: au_catalog::description(&code).to_string(),
                muscle_group: au_catalog::muscle_group(&code).to_string(),
            },
        );
    }

    let combinations = detect_combinations(&action_units);
    debug!(
        detector = %detector,
        aus = action_units.len(),
        combinations = combinations.len(),
        "Action units extracted"
    );

    let mut record = ActionUnitRecord {
        detector,
        face_detected: true,
        total_aus_detected: action_units.len(),
        action_units,
        combinations,
        active_aus: Vec::new(),
        face_box: face.face_box,
        error: None,
    };
    record.active_aus = record.active_summary();
    Ok(record)
}

/// Adapter for the model-based FACS detector
pub struct FacsAdapter {
    backend: Arc<dyn DetectorBackend>,
}

impl FacsAdapter {
    pub fn new(backend: Arc<dyn DetectorBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Detector for FacsAdapter {
    fn name(&self) -> DetectorName {
        DetectorName::Facs
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    async fn detect(&self, image_path: &Path) -> Result<DetectorRecord, DetectionFailure> {
        let raw = self.backend.invoke(image_path).await?;
        let record = action_unit_record_from_raw(DetectorName::Facs, &raw, FACS_INCLUSION_THRESHOLD)?;
        Ok(DetectorRecord::ActionUnits(record))
    }
}
