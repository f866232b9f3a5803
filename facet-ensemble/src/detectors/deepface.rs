//! DeepFace emotion adapter
//!
//! DeepFace is invoked on a staged copy of the input (see
//! [`super::staging::StagedImage`]); the copy is gone once `detect` returns.

use super::backend::DetectorBackend;
use super::normalization::{emotion_record_from_raw, LabelTable, CLASSIFIER_LABELS};
use super::staging::StagedImage;
use super::Detector;
use crate::types::{DetectionFailure, DetectorName, DetectorRecord};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// DeepFace uses the same short labels as FER
const DEEPFACE_LABELS: LabelTable = CLASSIFIER_LABELS;

/// File name prefix of staged copies
const STAGING_PREFIX: &str = "facet_deepface_";

/// Adapter for the DeepFace emotion classifier
pub struct DeepFaceAdapter {
    backend: Arc<dyn DetectorBackend>,
}

impl DeepFaceAdapter {
    pub fn new(backend: Arc<dyn DetectorBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Detector for DeepFaceAdapter {
    fn name(&self) -> DetectorName {
        DetectorName::DeepFace
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }

    async fn detect(&self, image_path: &Path) -> Result<DetectorRecord, DetectionFailure> {
        let source = image_path.to_path_buf();
        let staged = tokio::task::spawn_blocking(move || StagedImage::stage(&source, STAGING_PREFIX))
            .await
            .map_err(|e| DetectionFailure::BackendFailed(format!("Task join error: {}", e)))?
            .map_err(|e| {
                DetectionFailure::InvalidInput(format!(
                    "Cannot stage {}: {}",
                    image_path.display(),
                    e
                ))
            })?;

        let raw = self.backend.invoke(staged.path()).await?;
        debug!(faces = raw.faces.len(), "DeepFace returned detections");

        let record = emotion_record_from_raw(DetectorName::DeepFace, &raw, DEEPFACE_LABELS)?;
        Ok(DetectorRecord::Emotion(record))
    }
}
