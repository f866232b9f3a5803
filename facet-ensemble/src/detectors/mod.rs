//! Detector Adapters
//!
//! One adapter per detector family. Each wraps an opaque [`DetectorBackend`]
//! and normalizes its raw output into a canonical record.
//!
//! # Adapters
//! 1. **fer** - FER emotion classifier
//! 2. **deepface** - DeepFace emotion classifier (staged input copy)
//! 3. **facs** - model-based FACS action units (threshold 0.1)
//! 4. **simple_facs** - approximation-based FACS action units (threshold 0.05)
//!
//! # Failure isolation
//! Adapters return `Result<_, DetectionFailure>`; callers go through
//! [`guarded_detect`], which turns every failure (including a panicking
//! backend) into a record with `face_detected = false`.

pub mod au_catalog;
pub mod backend;
pub mod combinations;
pub mod deepface;
pub mod facs;
pub mod fer;
pub mod normalization;
pub mod simple_facs;
pub mod staging;

use crate::error::EnsembleError;
use crate::types::{DetectionFailure, DetectorName, DetectorRecord};
use async_trait::async_trait;
use backend::{CommandBackend, DetectorBackend, UnconfiguredBackend};
use facet_common::config::TomlConfig;
use futures::FutureExt;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub use deepface::DeepFaceAdapter;
pub use facs::FacsAdapter;
pub use fer::FerAdapter;
pub use simple_facs::SimpleFacsAdapter;

/// Detector adapter
///
/// Implementations normalize backend output into a [`DetectorRecord`] and
/// report failures as [`DetectionFailure`]; they never panic on bad input.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Which detector family this adapter wraps
    fn name(&self) -> DetectorName;

    /// Whether the backend can currently be invoked
    async fn is_available(&self) -> bool;

    /// Analyze one image
    async fn detect(&self, image_path: &Path) -> Result<DetectorRecord, DetectionFailure>;
}

/// Run `detector` behind the shared failure boundary
///
/// Always yields a record. Missing input, backend errors, empty scores, no
/// face and panics all become a failed record carrying the error description.
pub async fn guarded_detect(detector: &dyn Detector, image_path: &Path) -> DetectorRecord {
    let name = detector.name();

    if !image_path.is_file() {
        let failure = DetectionFailure::InvalidInput(format!(
            "Image not found: {}",
            image_path.display()
        ));
        warn!(detector = %name, error = %failure, "Detection skipped");
        return DetectorRecord::failed(name, &failure);
    }

    let outcome = AssertUnwindSafe(detector.detect(image_path))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(DetectionFailure::BackendFailed("detector panicked".to_string())));

    match outcome {
        Ok(record) => {
            debug!(
                detector = %name,
                face_detected = record.face_detected(),
                "Detection successful"
            );
            record
        }
        Err(failure) => {
            warn!(
                detector = %name,
                image = %image_path.display(),
                error = %failure,
                "Detection failed (per-detector error isolation)"
            );
            DetectorRecord::failed(name, &failure)
        }
    }
}

/// Availability of one registered detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorStatus {
    pub name: DetectorName,
    pub display_name: &'static str,
    pub available: bool,
}

/// Closed registry: [`DetectorName`] → adapter
#[derive(Default)]
pub struct DetectorRegistry {
    detectors: HashMap<DetectorName, Arc<dyn Detector>>,
}

impl DetectorRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every detector family, wired to configured commands
    ///
    /// Detectors without a `[detectors.<name>]` section get a backend that
    /// always reports itself unavailable.
    pub fn from_config(config: &TomlConfig) -> Self {
        let backend_for = |name: DetectorName| -> Arc<dyn DetectorBackend> {
            match config.detectors.get(name.as_str()) {
                Some(command) => Arc::new(CommandBackend::from_config(command)),
                None => Arc::new(UnconfiguredBackend::new(name.as_str())),
            }
        };

        Self::new()
            .with_detector(Arc::new(FerAdapter::new(backend_for(DetectorName::Fer))))
            .with_detector(Arc::new(DeepFaceAdapter::new(backend_for(DetectorName::DeepFace))))
            .with_detector(Arc::new(FacsAdapter::new(backend_for(DetectorName::Facs))))
            .with_detector(Arc::new(SimpleFacsAdapter::new(backend_for(DetectorName::SimpleFacs))))
    }

    /// Register (or replace) the adapter for `detector.name()`
    pub fn register(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.insert(detector.name(), detector);
    }

    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.register(detector);
        self
    }

    pub fn get(&self, name: DetectorName) -> Option<Arc<dyn Detector>> {
        self.detectors.get(&name).cloned()
    }

    /// Adapter to run for `name`
    ///
    /// A request for FACS whose model backend is unavailable is served by
    /// SimpleFACS when that one is available.
    pub async fn resolve(&self, name: DetectorName) -> Result<Arc<dyn Detector>, EnsembleError> {
        let detector = self.get(name).ok_or(EnsembleError::NotRegistered(name))?;

        if name == DetectorName::Facs && !detector.is_available().await {
            if let Some(fallback) = self.get(DetectorName::SimpleFacs) {
                if fallback.is_available().await {
                    warn!("FACS model unavailable, falling back to SimpleFACS");
                    return Ok(fallback);
                }
            }
        }

        Ok(detector)
    }

    /// Availability of every registered detector, in canonical detector order
    pub async fn available(&self) -> Vec<DetectorStatus> {
        let mut status = Vec::with_capacity(self.detectors.len());
        for detector in DetectorName::ALL.iter().filter_map(|name| self.detectors.get(name)) {
            status.push(DetectorStatus {
                name: detector.name(),
                display_name: detector.name().display_name(),
                available: detector.is_available().await,
            });
        }
        status
    }
}
