//! Test Helper Utilities
//!
//! Shared fixtures for facet-ensemble integration tests: scripted detector
//! backends, throwaway image files, and AU record builders.

#![allow(dead_code)]

use async_trait::async_trait;
use facet_ensemble::detectors::backend::{DetectorBackend, RawDetection};
use facet_ensemble::detectors::facs::{action_unit_record_from_raw, FACS_INCLUSION_THRESHOLD};
use facet_ensemble::detectors::{
    DeepFaceAdapter, DetectorRegistry, FacsAdapter, FerAdapter, SimpleFacsAdapter,
};
use facet_ensemble::types::DetectionFailure;
use facet_ensemble::{DetectorName, DetectorRecord};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Backend returning a scripted detection, optionally after a delay
pub struct ScriptedBackend {
    result: Result<RawDetection, DetectionFailure>,
    available: bool,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn scores(scores: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(RawDetection::single(scores)),
            available: true,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(scores: &[(&str, f64)], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(RawDetection::single(scores)),
            available: true,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn no_face() -> Arc<Self> {
        Arc::new(Self {
            result: Ok(RawDetection::default()),
            available: true,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(failure: DetectionFailure) -> Arc<Self> {
        Arc::new(Self {
            result: Err(failure),
            available: true,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            result: Err(DetectionFailure::DetectorUnavailable("model not installed".into())),
            available: false,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectorBackend for ScriptedBackend {
    async fn invoke(&self, _image_path: &Path) -> Result<RawDetection, DetectionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }

    async fn is_available(&self) -> bool {
        self.available
    }
}

/// Backends for each detector family
pub struct Backends {
    pub fer: Arc<ScriptedBackend>,
    pub deepface: Arc<ScriptedBackend>,
    pub facs: Arc<ScriptedBackend>,
    pub simple_facs: Arc<ScriptedBackend>,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            fer: ScriptedBackend::no_face(),
            deepface: ScriptedBackend::no_face(),
            facs: ScriptedBackend::no_face(),
            simple_facs: ScriptedBackend::no_face(),
        }
    }
}

impl Backends {
    pub fn registry(&self) -> DetectorRegistry {
        DetectorRegistry::new()
            .with_detector(Arc::new(FerAdapter::new(self.fer.clone())))
            .with_detector(Arc::new(DeepFaceAdapter::new(self.deepface.clone())))
            .with_detector(Arc::new(FacsAdapter::new(self.facs.clone())))
            .with_detector(Arc::new(SimpleFacsAdapter::new(self.simple_facs.clone())))
    }
}

/// Write a placeholder image file; detectors are scripted so content is irrelevant
pub fn fixture_image(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"\xFF\xD8\xFF\xE0 not really a jpeg").unwrap();
    path
}

/// FACS record built through the real normalization path
pub fn facs_record(pairs: &[(&str, f64)]) -> DetectorRecord {
    let record = action_unit_record_from_raw(
        DetectorName::Facs,
        &RawDetection::single(pairs),
        FACS_INCLUSION_THRESHOLD,
    )
    .unwrap();
    DetectorRecord::ActionUnits(record)
}
