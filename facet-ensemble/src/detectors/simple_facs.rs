//! Approximation-based FACS adapter
//!
//! Backed by a lightweight region-heuristic detector. Its intensities are
//! coarser than the model's, so a lower inclusion threshold is used.

use super::backend::DetectorBackend;
use super::facs::action_unit_record_from_raw;
use super::Detector;
use crate::types::{DetectionFailure, DetectorName, DetectorRecord};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// AUs at or below this intensity are dropped by the approximation detector
pub const SIMPLE_FACS_INCLUSION_THRESHOLD: f64 = 0.05;

pub struct SimpleFacsAdapter {
    backend: Arc<dyn DetectorBackend>,
}

impl SimpleFacsAdapter {
    pub fn new(backend: Arc<dyn DetectorBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Detector for SimpleFacsAdapter {
    fn name(&self) -> DetectorName {
        DetectorName::SimpleFacs
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    async fn detect(&self, image_path: &Path) -> Result<DetectorRecord, DetectionFailure> {
        let raw = self.backend.invoke(image_path).await?;
        let record = action_unit_record_from_raw(
            DetectorName::SimpleFacs,
            &raw,
            SIMPLE_FACS_INCLUSION_THRESHOLD,
        )?;
        Ok(DetectorRecord::ActionUnits(record))
    }
}
