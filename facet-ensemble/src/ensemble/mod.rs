//! Ensemble Aggregator
//!
//! Runs a requested set of detectors against one image concurrently, then
//! compares the qualifying emotion records pairwise and reduces them to a
//! consensus.
//!
//! # Qualification
//! Only face-detected [`EmotionRecord`]s take part in comparison. Action unit
//! records are collected in the report but never compared.

pub mod comparison;
pub mod consensus;
pub mod statistics;

pub use comparison::PairwiseComparison;
pub use consensus::{Consensus, ConsensusConfidence};

use crate::detectors::{guarded_detect, DetectorRegistry};
use crate::error::EnsembleError;
use crate::types::{DetectorName, DetectorRecord, EmotionRecord};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Cross-detector statistics for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleComparison {
    /// Keyed by pair, e.g. "fer_vs_deepface"
    pub pairwise: BTreeMap<String, PairwiseComparison>,
    pub consensus: Consensus,
}

/// Result of one ensemble run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleReport {
    pub run_id: Uuid,
    pub image: PathBuf,
    pub analyzed_at: DateTime<Utc>,
    /// Requested detectors, deduplicated, in request order
    pub detectors: Vec<DetectorName>,
    /// One record per requested detector
    pub results: BTreeMap<DetectorName, DetectorRecord>,
    /// Present when at least two emotion records qualified
    pub comparison: Option<EnsembleComparison>,
}

impl EnsembleReport {
    pub fn get(&self, detector: DetectorName) -> Option<&DetectorRecord> {
        self.results.get(&detector)
    }

    /// Face-detected emotion records in request order
    pub fn qualifying_emotion_records(&self) -> Vec<&EmotionRecord> {
        self.detectors
            .iter()
            .filter_map(|name| self.results.get(name))
            .filter_map(DetectorRecord::as_emotion)
            .filter(|record| record.face_detected)
            .collect()
    }
}

/// Parse detector names; an unknown name fails the whole request
pub fn parse_detector_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<DetectorName>, EnsembleError> {
    names
        .iter()
        .map(|name| {
            name.as_ref()
                .parse::<DetectorName>()
                .map_err(EnsembleError::UnknownDetector)
        })
        .collect()
}

/// Concurrent multi-detector runner
pub struct Ensemble {
    registry: Arc<DetectorRegistry>,
}

impl Ensemble {
    pub fn new(registry: Arc<DetectorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    /// Run detectors named by string (e.g. from a CLI or request body)
    pub async fn run_named<S: AsRef<str>>(
        &self,
        image_path: &Path,
        names: &[S],
    ) -> Result<EnsembleReport, EnsembleError> {
        let names = parse_detector_names(names)?;
        self.run(image_path, &names).await
    }

    /// Run `names` against `image_path`
    ///
    /// Errors only on contract violations (empty request, unregistered
    /// detector), before any detector runs. Detector failures become failed
    /// records in their slot.
    pub async fn run(
        &self,
        image_path: &Path,
        names: &[DetectorName],
    ) -> Result<EnsembleReport, EnsembleError> {
        let mut requested: Vec<DetectorName> = Vec::with_capacity(names.len());
        for name in names {
            if !requested.contains(name) {
                requested.push(*name);
            }
        }
        if requested.is_empty() {
            return Err(EnsembleError::EmptyDetectorSet);
        }

        let mut detectors = Vec::with_capacity(requested.len());
        for name in &requested {
            detectors.push((*name, self.registry.resolve(*name).await?));
        }

        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            image = %image_path.display(),
            detectors = requested.len(),
            "Starting ensemble run"
        );

        let futures = detectors.into_iter().map(|(name, detector)| async move {
            let record = guarded_detect(detector.as_ref(), image_path).await;
            (name, record)
        });
        let results: BTreeMap<DetectorName, DetectorRecord> =
            join_all(futures).await.into_iter().collect();

        let mut report = EnsembleReport {
            run_id,
            image: image_path.to_path_buf(),
            analyzed_at: Utc::now(),
            detectors: requested,
            results,
            comparison: None,
        };
        report.comparison = compare(&report.qualifying_emotion_records());

        info!(
            run_id = %run_id,
            faces = report.results.values().filter(|r| r.face_detected()).count(),
            consensus = ?report.comparison.as_ref().map(|c| c.consensus.emotion),
            "Ensemble run complete"
        );

        Ok(report)
    }
}

/// Pairwise statistics and consensus over qualifying records
fn compare(records: &[&EmotionRecord]) -> Option<EnsembleComparison> {
    if records.len() < 2 {
        debug!(qualifying = records.len(), "Not enough emotion records to compare");
        return None;
    }

    let pairwise = comparison::compare_all(records)
        .into_iter()
        .map(|p| (p.key(), p))
        .collect();
    let consensus = consensus::build_consensus(records)?;

    Some(EnsembleComparison { pairwise, consensus })
}
