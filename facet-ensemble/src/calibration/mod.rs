//! Calibration Store
//!
//! Holds at most one baseline (neutral-expression AU measurement) per person
//! identifier, backed by a durable [`BaselineRepository`].
//!
//! # Locking
//! Each person has its own `RwLock` slot: `set`/`load`/`clear` take the write
//! half, info and delta queries the read half. The slot index is only locked
//! long enough to find or create a slot, so different people never contend.
//!
//! # Active person
//! The most recently set or loaded person becomes active; [`CalibrationStore::calculate_delta`]
//! and [`CalibrationStore::baseline_info`] operate on the active baseline.

pub mod repository;

pub use repository::{BaselineRepository, JsonFileRepository, SqliteRepository};

use repository::validate_person_id;

use crate::delta::{self, DeltaReport};
use crate::error::CalibrationError;
use crate::types::{ActionUnit, AuCode, DetectorKind, DetectorRecord};
use chrono::{DateTime, Utc};
use facet_common::numeric::round_to;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Person identifier used when the caller does not name one
pub const DEFAULT_PERSON_ID: &str = "default";

/// Reference AU measurement for one person
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub person_id: String,
    pub timestamp: DateTime<Utc>,
    pub action_units: BTreeMap<AuCode, ActionUnit>,
    pub total_aus_detected: usize,
    /// Display name of the detector that produced the measurement
    pub analyzer: String,
    pub note: String,
}

/// Summary of a stored baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineInfo {
    pub person_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_aus: usize,
    pub analyzer: String,
    /// Minutes since the baseline was taken (1 decimal)
    pub age_minutes: f64,
}

impl Baseline {
    /// Build a baseline from a calibration record
    ///
    /// Accepts only face-detected action unit records with at least one AU.
    pub fn from_record(record: &DetectorRecord, person_id: &str) -> Result<Self, CalibrationError> {
        let detector = record.detector();
        if detector.kind() != DetectorKind::ActionUnit {
            return Err(CalibrationError::InvalidCalibrationTarget(format!(
                "{} does not produce action units",
                detector.display_name()
            )));
        }

        let au_record = record.as_action_units().ok_or_else(|| {
            CalibrationError::InvalidCalibrationTarget("not an action unit record".to_string())
        })?;

        if !au_record.face_detected {
            return Err(CalibrationError::InvalidCalibrationTarget(
                "no face detected".to_string(),
            ));
        }
        if au_record.action_units.is_empty() {
            return Err(CalibrationError::InvalidCalibrationTarget(
                "no action units detected".to_string(),
            ));
        }

        Ok(Self {
            person_id: person_id.to_string(),
            timestamp: Utc::now(),
            total_aus_detected: au_record.action_units.len(),
            action_units: au_record.action_units.clone(),
            analyzer: detector.display_name().to_string(),
            note: format!("Baseline set for {}", person_id),
        })
    }

    pub fn info_at(&self, now: DateTime<Utc>) -> BaselineInfo {
        let age_ms = (now - self.timestamp).num_milliseconds().max(0);
        BaselineInfo {
            person_id: self.person_id.clone(),
            timestamp: self.timestamp,
            total_aus: self.total_aus_detected,
            analyzer: self.analyzer.clone(),
            age_minutes: round_to(age_ms as f64 / 60_000.0, 1),
        }
    }
}

type Slot = Arc<RwLock<Option<Baseline>>>;

/// Per-person baseline store
pub struct CalibrationStore {
    repository: Arc<dyn BaselineRepository>,
    slots: RwLock<HashMap<String, Slot>>,
    active_person: RwLock<Option<String>>,
}

impl CalibrationStore {
    pub fn new(repository: Arc<dyn BaselineRepository>) -> Self {
        Self {
            repository,
            slots: RwLock::new(HashMap::new()),
            active_person: RwLock::new(None),
        }
    }

    /// Find or create the slot for `person_id`
    async fn slot(&self, person_id: &str) -> Slot {
        if let Some(slot) = self.existing_slot(person_id).await {
            return slot;
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(person_id.to_string()).or_default())
    }

    /// Existing slot for `person_id`; read paths never create slots
    async fn existing_slot(&self, person_id: &str) -> Option<Slot> {
        self.slots.read().await.get(person_id).cloned()
    }

    /// Drop the slot for `person_id` if it is empty and nobody else holds it
    ///
    /// Any other holder cloned the slot from the index, so with the index
    /// write-locked a strong count of two (index + `slot`) means no waiter.
    async fn prune(&self, person_id: &str, slot: &Slot) {
        let mut slots = self.slots.write().await;
        let empty = slot.try_read().map(|current| current.is_none()).unwrap_or(false);
        let unshared = Arc::strong_count(slot) == 2
            && slots.get(person_id).is_some_and(|entry| Arc::ptr_eq(entry, slot));
        if empty && unshared {
            slots.remove(person_id);
        }
    }

    /// Make `record` the baseline for `person_id`
    ///
    /// The durable document is written before the in-memory baseline is
    /// replaced; on any error the previous state is kept.
    pub async fn set_baseline(
        &self,
        record: &DetectorRecord,
        person_id: &str,
    ) -> Result<BaselineInfo, CalibrationError> {
        let baseline = Baseline::from_record(record, person_id)?;
        validate_person_id(person_id)?;
        let info = baseline.info_at(baseline.timestamp);

        let slot = self.slot(person_id).await;
        let mut current = slot.write().await;
        if let Err(e) = self.repository.save(&baseline).await {
            drop(current);
            self.prune(person_id, &slot).await;
            return Err(e.into());
        }
        *current = Some(baseline);
        drop(current);

        *self.active_person.write().await = Some(person_id.to_string());

        info!(
            person_id = %person_id,
            aus = info.total_aus,
            analyzer = %info.analyzer,
            "Baseline set"
        );
        Ok(info)
    }

    /// Load the durable baseline for `person_id` and make it active
    ///
    /// A slot is only created once the repository holds a document.
    pub async fn load_baseline(&self, person_id: &str) -> Result<BaselineInfo, CalibrationError> {
        let missing = || CalibrationError::NoBaselineStored(person_id.to_string());

        let slot = match self.existing_slot(person_id).await {
            Some(slot) => slot,
            None => {
                self.repository.load(person_id).await?.ok_or_else(missing)?;
                self.slot(person_id).await
            }
        };

        // Re-read under the slot lock so a concurrent set or clear is not undone
        let mut current = slot.write().await;
        let loaded = match self.repository.load(person_id).await {
            Ok(Some(baseline)) => baseline,
            Ok(None) => {
                drop(current);
                self.prune(person_id, &slot).await;
                return Err(missing());
            }
            Err(e) => {
                drop(current);
                self.prune(person_id, &slot).await;
                return Err(e.into());
            }
        };
        let info = loaded.info_at(Utc::now());
        *current = Some(loaded);
        drop(current);

        *self.active_person.write().await = Some(person_id.to_string());

        info!(person_id = %person_id, aus = info.total_aus, "Baseline loaded");
        Ok(info)
    }

    /// Drop the baseline for `person_id` from memory and durable storage
    pub async fn clear_baseline(&self, person_id: &str) -> Result<(), CalibrationError> {
        let removed = match self.existing_slot(person_id).await {
            Some(slot) => {
                let mut current = slot.write().await;
                let removed = self.repository.remove(person_id).await?;
                *current = None;
                drop(current);
                self.prune(person_id, &slot).await;
                removed
            }
            None => self.repository.remove(person_id).await?,
        };

        let mut active = self.active_person.write().await;
        if active.as_deref() == Some(person_id) {
            *active = None;
        }

        info!(person_id = %person_id, document_removed = removed, "Baseline cleared");
        Ok(())
    }

    /// Currently active person, if any
    pub async fn active_person(&self) -> Option<String> {
        self.active_person.read().await.clone()
    }

    /// Info about the active baseline
    pub async fn baseline_info(&self) -> Option<BaselineInfo> {
        let person_id = self.active_person().await?;
        self.baseline_info_for(&person_id).await
    }

    /// Info about the in-memory baseline of `person_id`
    pub async fn baseline_info_for(&self, person_id: &str) -> Option<BaselineInfo> {
        let slot = self.existing_slot(person_id).await?;
        let current = slot.read().await;
        current.as_ref().map(|baseline| baseline.info_at(Utc::now()))
    }

    /// Delta of `record` against the active baseline
    pub async fn calculate_delta(&self, record: &DetectorRecord) -> DeltaReport {
        match self.active_person().await {
            Some(person_id) => self.calculate_delta_for(&person_id, record).await,
            None => {
                debug!("Delta requested with no active baseline");
                DeltaReport::no_baseline()
            }
        }
    }

    /// Delta of `record` against the baseline of `person_id`
    pub async fn calculate_delta_for(&self, person_id: &str, record: &DetectorRecord) -> DeltaReport {
        let Some(slot) = self.existing_slot(person_id).await else {
            return DeltaReport::no_baseline();
        };
        let current = slot.read().await;
        match current.as_ref() {
            Some(baseline) => delta::calculate_delta(baseline, record),
            None => DeltaReport::no_baseline(),
        }
    }
}
