//! Integration tests for per-person calibration with JSON document storage
//!
//! Covers:
//! - Baseline set / restart / load round trip through the file repository
//! - Clearing baselines (memory and durable document)
//! - Delta computation against a stored baseline
//! - Engine-level analysis with attached deltas

mod helpers;

use facet_ensemble::calibration::{BaselineRepository, JsonFileRepository, DEFAULT_PERSON_ID};
use facet_ensemble::delta::ChangeType;
use facet_ensemble::ensemble::Ensemble;
use facet_ensemble::{
    CalibrationError, CalibrationStore, DetectorName, FacetEngine, StorageError,
};
use helpers::{facs_record, fixture_image, Backends, ScriptedBackend};
use std::sync::Arc;
use tempfile::TempDir;

fn json_store(dir: &TempDir) -> CalibrationStore {
    CalibrationStore::new(Arc::new(JsonFileRepository::new(dir.path().join("baselines"))))
}

#[tokio::test]
async fn test_baseline_survives_restart() {
    let dir = TempDir::new().unwrap();
    let neutral = facs_record(&[("AU12", 0.15), ("AU06", 0.15), ("AU04", 0.2)]);

    {
        let store = json_store(&dir);
        let info = store.set_baseline(&neutral, "alice").await.unwrap();
        assert_eq!(info.person_id, "alice");
        assert_eq!(info.total_aus, 3);
        assert_eq!(info.analyzer, "FACS");
        assert_eq!(store.active_person().await.as_deref(), Some("alice"));
    }

    assert!(dir.path().join("baselines/alice_baseline.json").is_file());

    // Fresh store: nothing in memory until loaded
    let store = json_store(&dir);
    assert!(store.baseline_info_for("alice").await.is_none());
    assert!(!store.calculate_delta_for("alice", &neutral).await.has_baseline);

    let info = store.load_baseline("alice").await.unwrap();
    assert_eq!(info.total_aus, 3);
    assert_eq!(store.active_person().await.as_deref(), Some("alice"));

    let report = store.calculate_delta(&neutral).await;
    assert!(report.has_baseline);
    let result = report.result.unwrap();
    assert_eq!(result.total_movement, 0.0);
    assert!(result.significant_changes.is_empty());
}

#[tokio::test]
async fn test_load_without_document_is_reported() {
    let dir = TempDir::new().unwrap();
    let store = json_store(&dir);

    let err = store.load_baseline("nobody").await.unwrap_err();
    assert!(matches!(err, CalibrationError::NoBaselineStored(ref p) if p == "nobody"));
    assert!(store.active_person().await.is_none());
}

#[tokio::test]
async fn test_clear_removes_memory_and_document() {
    let dir = TempDir::new().unwrap();
    let store = json_store(&dir);
    let neutral = facs_record(&[("AU12", 0.2)]);

    store.set_baseline(&neutral, "bob").await.unwrap();
    store.clear_baseline("bob").await.unwrap();

    assert!(store.baseline_info_for("bob").await.is_none());
    assert!(store.active_person().await.is_none());
    assert!(!dir.path().join("baselines/bob_baseline.json").exists());

    // Clearing again is not an error
    store.clear_baseline("bob").await.unwrap();
}

#[tokio::test]
async fn test_invalid_person_id_rejected_before_write() {
    let dir = TempDir::new().unwrap();
    let store = json_store(&dir);
    let neutral = facs_record(&[("AU12", 0.2)]);

    let err = store.set_baseline(&neutral, "../escape").await.unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::Storage(StorageError::InvalidPersonId(_))
    ));
    assert!(store.baseline_info_for("../escape").await.is_none());
    assert!(store.active_person().await.is_none());
}

#[tokio::test]
async fn test_people_have_independent_baselines() {
    let dir = TempDir::new().unwrap();
    let store = json_store(&dir);

    store
        .set_baseline(&facs_record(&[("AU12", 0.2)]), "alice")
        .await
        .unwrap();
    store
        .set_baseline(&facs_record(&[("AU12", 0.6)]), "bob")
        .await
        .unwrap();

    let current = facs_record(&[("AU12", 0.6)]);
    let alice = store.calculate_delta_for("alice", &current).await.result.unwrap();
    let bob = store.calculate_delta_for("bob", &current).await.result.unwrap();

    assert_eq!(alice.deltas["AU12"].delta, 0.4);
    assert_eq!(alice.deltas["AU12"].change_type, ChangeType::Significant);
    assert_eq!(bob.deltas["AU12"].delta, 0.0);

    // Active person follows the most recent set
    assert_eq!(store.active_person().await.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_smile_relative_to_baseline() {
    let dir = TempDir::new().unwrap();
    let store = json_store(&dir);

    let neutral = facs_record(&[("AU12", 0.15), ("AU06", 0.15), ("AU04", 0.2)]);
    store.set_baseline(&neutral, DEFAULT_PERSON_ID).await.unwrap();

    let smiling = facs_record(&[("AU12", 0.75), ("AU06", 0.55), ("AU04", 0.2)]);
    let result = store.calculate_delta(&smiling).await.result.unwrap();

    assert_eq!(result.deltas["AU12"].delta, 0.6);
    assert_eq!(result.deltas["AU12"].change_type, ChangeType::Major);
    assert_eq!(result.deltas["AU06"].delta, 0.4);
    assert_eq!(result.deltas["AU04"].change_type, ChangeType::Minimal);

    let order: Vec<&str> = result
        .significant_changes
        .iter()
        .map(|c| c.au.as_str())
        .collect();
    assert_eq!(order, vec!["AU12", "AU06"]);

    assert_eq!(result.movement_patterns.len(), 1);
    assert_eq!(result.movement_patterns[0].pattern, "Duchenne Smile Development");
    assert_eq!(result.movement_patterns[0].intensity, 0.5);
    assert_eq!(result.total_movement, 1.0);
}

#[tokio::test]
async fn test_engine_attaches_deltas_for_action_unit_records() {
    let dir = TempDir::new().unwrap();
    let image = fixture_image(&dir, "face.jpg");

    let backends = Backends {
        fer: ScriptedBackend::scores(&[("happy", 0.7), ("neutral", 0.3)]),
        facs: ScriptedBackend::scores(&[("AU12", 0.7), ("AU06", 0.5)]),
        ..Default::default()
    };
    let engine = FacetEngine::new(
        Ensemble::new(Arc::new(backends.registry())),
        json_store(&dir),
    );

    engine
        .calibration
        .set_baseline(&facs_record(&[("AU12", 0.2), ("AU06", 0.2)]), "carol")
        .await
        .unwrap();

    let report = engine
        .analyze(&image, &[DetectorName::Fer, DetectorName::Facs], Some("carol"))
        .await
        .unwrap();

    assert_eq!(report.person_id.as_deref(), Some("carol"));
    assert_eq!(report.deltas.len(), 1);
    let facs_delta = report.deltas[&DetectorName::Facs].result.as_ref().unwrap();
    assert_eq!(facs_delta.deltas["AU12"].delta, 0.5);
    assert_eq!(facs_delta.movement_patterns[0].pattern, "Duchenne Smile Development");

    // Without a person the report carries no deltas
    let report = engine
        .analyze(&image, &[DetectorName::Facs], None)
        .await
        .unwrap();
    assert!(report.deltas.is_empty());
    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("deltas").is_none());
    assert!(json.get("results").is_some());
}

#[tokio::test]
async fn test_engine_reports_missing_baseline_per_record() {
    let dir = TempDir::new().unwrap();
    let image = fixture_image(&dir, "face.jpg");

    let backends = Backends {
        facs: ScriptedBackend::scores(&[("AU12", 0.7)]),
        ..Default::default()
    };
    let engine = FacetEngine::new(
        Ensemble::new(Arc::new(backends.registry())),
        json_store(&dir),
    );

    let report = engine
        .analyze(&image, &[DetectorName::Facs], Some("dave"))
        .await
        .unwrap();

    let delta = &report.deltas[&DetectorName::Facs];
    assert!(!delta.has_baseline);
    assert_eq!(delta.error.as_deref(), Some("No baseline set"));
}

#[tokio::test]
async fn test_setting_same_baseline_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = json_store(&dir);
    let neutral = facs_record(&[("AU12", 0.15), ("AU06", 0.25), ("AU04", 0.2)]);
    let expected = neutral.as_action_units().unwrap();

    let first = store.set_baseline(&neutral, "ivy").await.unwrap();
    let second = store.set_baseline(&neutral, "ivy").await.unwrap();
    assert_eq!(first.total_aus, second.total_aus);
    assert_eq!(first.analyzer, second.analyzer);

    let repo = JsonFileRepository::new(dir.path().join("baselines"));
    let stored = repo.load("ivy").await.unwrap().unwrap();
    assert_eq!(stored.action_units, expected.action_units);
    assert_eq!(stored.total_aus_detected, 3);
    assert_eq!(stored.analyzer, "FACS");

    let documents: Vec<_> = std::fs::read_dir(dir.path().join("baselines"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(documents, vec!["ivy_baseline.json".to_string()]);
}
