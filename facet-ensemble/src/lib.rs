//! facet-ensemble library interface
//!
//! Facial signal ensemble: detector adapters, cross-detector aggregation,
//! per-person calibration and baseline deltas.

pub mod calibration;
pub mod delta;
pub mod detectors;
pub mod ensemble;
pub mod error;
pub mod types;

pub use crate::calibration::{CalibrationStore, DEFAULT_PERSON_ID};
pub use crate::error::{CalibrationError, EnsembleError, StorageError};
pub use crate::types::{DetectorName, DetectorRecord};

use crate::delta::DeltaReport;
use crate::ensemble::{Ensemble, EnsembleReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Ensemble run plus optional calibration-relative deltas
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub ensemble: EnsembleReport,
    /// Person whose baseline the deltas refer to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    /// One delta report per action unit record in the run
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub deltas: BTreeMap<DetectorName, DeltaReport>,
}

/// Shared entry point: ensemble runner plus calibration store
#[derive(Clone)]
pub struct FacetEngine {
    pub ensemble: Arc<Ensemble>,
    pub calibration: Arc<CalibrationStore>,
}

impl FacetEngine {
    pub fn new(ensemble: Ensemble, calibration: CalibrationStore) -> Self {
        Self {
            ensemble: Arc::new(ensemble),
            calibration: Arc::new(calibration),
        }
    }

    /// Run `detectors` on `image_path`; with `person_id`, also compute deltas
    /// of every action unit record against that person's baseline
    pub async fn analyze(
        &self,
        image_path: &Path,
        detectors: &[DetectorName],
        person_id: Option<&str>,
    ) -> Result<AnalysisReport, EnsembleError> {
        let report = self.ensemble.run(image_path, detectors).await?;

        let mut deltas = BTreeMap::new();
        if let Some(person_id) = person_id {
            for (name, record) in &report.results {
                if record.as_action_units().is_none() {
                    continue;
                }
                let delta = self.calibration.calculate_delta_for(person_id, record).await;
                debug!(detector = %name, has_baseline = delta.has_baseline, "Delta attached");
                deltas.insert(*name, delta);
            }
        }

        Ok(AnalysisReport {
            ensemble: report,
            person_id: person_id.map(str::to_string),
            deltas,
        })
    }
}
