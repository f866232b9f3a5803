//! FER emotion adapter

use super::backend::DetectorBackend;
use super::normalization::{emotion_record_from_raw, LabelTable, CLASSIFIER_LABELS};
use super::Detector;
use crate::types::{DetectionFailure, DetectorName, DetectorRecord};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// FER reports `angry`/`happy`/`sad`; the rest are already canonical
const FER_LABELS: LabelTable = CLASSIFIER_LABELS;

/// Adapter for the FER (MTCNN-based) emotion classifier
pub struct FerAdapter {
    backend: Arc<dyn DetectorBackend>,
}

impl FerAdapter {
    pub fn new(backend: Arc<dyn DetectorBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Detector for FerAdapter {
    fn name(&self) -> DetectorName {
        DetectorName::Fer
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    async fn detect(&self, image_path: &Path) -> Result<DetectorRecord, DetectionFailure> {
        let raw = self.backend.invoke(image_path).await?;
        debug!(faces = raw.faces.len(), "FER returned detections");

        let record = emotion_record_from_raw(DetectorName::Fer, &raw, FER_LABELS)?;
        Ok(DetectorRecord::Emotion(record))
    }
}
