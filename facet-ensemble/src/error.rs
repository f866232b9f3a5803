//! Error types for facet-ensemble
//!
//! Detector failures are not errors at this level: they become failed records
//! (see [`crate::types::DetectionFailure`]). The enums here cover contract
//! violations by callers and storage faults.

use crate::types::DetectorName;
use thiserror::Error;

/// Ensemble request errors
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// Requested detector name is not part of the closed detector set
    #[error("{0}")]
    UnknownDetector(String),

    /// Detector name is known but no adapter is registered for it
    #[error("Detector not registered: {0}")]
    NotRegistered(DetectorName),

    /// Request named no detectors
    #[error("No detectors requested")]
    EmptyDetectorSet,
}

/// Durable baseline storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Person identifier cannot be used as a storage key
    #[error("Invalid person id: {0:?}")]
    InvalidPersonId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Calibration store errors
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Record cannot become a baseline (wrong detector kind, no face, or no AUs)
    #[error("Invalid calibration target: {0}")]
    InvalidCalibrationTarget(String),

    /// No durable baseline exists for the person
    #[error("No baseline stored for {0}")]
    NoBaselineStored(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
