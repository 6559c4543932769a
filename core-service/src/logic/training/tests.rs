use chrono::Utc;

use super::synthetic;
use super::{CancelToken, TrainingConfig, TrainingPipeline, TrainingSource};
use crate::logic::error::EngineError;
use crate::logic::model::reconstruction::ReconstructionModel;
use crate::logic::model::FusionThresholds;
use crate::logic::registry::ModelRegistry;

fn small_config() -> TrainingConfig {
    TrainingConfig {
        synthetic_samples: 3000,
        n_trees: 50,
        ..Default::default()
    }
}

fn pipeline(config: TrainingConfig) -> TrainingPipeline {
    TrainingPipeline::new(config, FusionThresholds::default())
}

#[test]
fn test_synthetic_run_installs_flagged_snapshot() {
    let registry = ModelRegistry::in_memory();
    let p = pipeline(small_config());

    let snapshot = p.run(&registry, p.synthetic_source(), &CancelToken::new()).unwrap();
    assert_eq!(snapshot.version, 1);
    assert!(snapshot.synthetic);
    assert_eq!(snapshot.metrics.holdout_count, 600);
    assert_eq!(snapshot.training_sample_count, 2400);
    assert!(snapshot.accuracy > 0.5 && snapshot.accuracy <= 1.0);
    assert_eq!(registry.current().unwrap().id, snapshot.id);
}

#[test]
fn test_held_out_rows_reconstruct_below_threshold() {
    let snapshot = pipeline(small_config())
        .fit(TrainingSource::Synthetic { samples: 3000, seed: 1 }, 1, &CancelToken::new())
        .unwrap();

    let fresh = synthetic::generate(1000, 99, Utc::now()).unwrap();
    let below = fresh
        .iter()
        .filter(|s| {
            let x = snapshot.normalize(&s.encode()).unwrap();
            snapshot.reconstruction.score(&x).unwrap() < FusionThresholds::default().reconstruction
        })
        .count();
    assert!(below >= 950, "only {} of 1000 fresh rows below threshold", below);
    assert!(snapshot.metrics.holdout_p95_error.unwrap() < 0.02);
}

#[test]
fn test_holdout_reports_detection_performance() {
    let snapshot = pipeline(small_config())
        .fit(TrainingSource::Synthetic { samples: 3000, seed: 4 }, 1, &CancelToken::new())
        .unwrap();
    let m = &snapshot.metrics;

    assert_eq!(m.injected_anomalies, 60);
    let recall = m.recall.unwrap();
    assert!(recall >= 0.95, "recall {} on far-feature rows", recall);

    let precision = m.precision.unwrap();
    assert!(precision > 0.0 && precision <= 1.0);
    let f1 = m.f1_score.unwrap();
    assert!((f1 - 2.0 * precision * recall / (precision + recall)).abs() < 1e-12);

    let info = snapshot.info();
    assert_eq!(info.recall, m.recall);
    assert_eq!(info.f1_score, m.f1_score);
}

#[test]
fn test_holdout_metrics_are_reproducible() {
    let p = pipeline(small_config());
    let source = TrainingSource::Synthetic { samples: 2500, seed: 6 };
    let a = p.fit(source.clone(), 1, &CancelToken::new()).unwrap();
    let b = p.fit(source, 1, &CancelToken::new()).unwrap();
    assert_eq!(a.metrics, b.metrics);
    assert_eq!(a.accuracy, b.accuracy);
}

#[test]
fn test_no_injection_leaves_rates_unset() {
    let config = TrainingConfig {
        holdout_anomaly_fraction: 0.0,
        ..small_config()
    };
    let snapshot = pipeline(config)
        .fit(TrainingSource::Synthetic { samples: 3000, seed: 4 }, 1, &CancelToken::new())
        .unwrap();
    assert_eq!(snapshot.metrics.injected_anomalies, 0);
    assert!(snapshot.metrics.precision.is_none());
    assert!(snapshot.metrics.recall.is_none());
    assert!(snapshot.accuracy > 0.5);
}

#[test]
fn test_historical_rows_are_validated() {
    let mut rows = synthetic::generate(1200, 5, Utc::now()).unwrap();
    rows[0].temperature = Some(f64::NAN);
    rows[1].vibration = Some(3.0);

    let snapshot = pipeline(small_config())
        .fit(TrainingSource::Historical(rows), 1, &CancelToken::new())
        .unwrap();
    assert!(!snapshot.synthetic);
    assert_eq!(snapshot.metrics.skipped_rows, 2);
}

#[test]
fn test_small_dataset_uses_fallback_accuracy() {
    let config = TrainingConfig {
        min_samples: 100,
        ..small_config()
    };
    let snapshot = pipeline(config)
        .fit(TrainingSource::Synthetic { samples: 110, seed: 2 }, 1, &CancelToken::new())
        .unwrap();
    assert_eq!(snapshot.metrics.holdout_count, 0);
    assert_eq!(snapshot.accuracy, 0.924);
    assert!(snapshot.metrics.recall.is_none());
    assert_eq!(snapshot.training_sample_count, 110);
}

#[test]
fn test_insufficient_data_leaves_registry_untouched() {
    let registry = ModelRegistry::in_memory();
    let p = pipeline(small_config());
    p.run(&registry, p.synthetic_source(), &CancelToken::new()).unwrap();

    let rows = synthetic::generate(10, 1, Utc::now()).unwrap();
    let result = p.run(&registry, TrainingSource::Historical(rows), &CancelToken::new());
    assert!(matches!(
        result,
        Err(EngineError::InsufficientData { required: 1000, actual: 10 })
    ));
    assert_eq!(registry.current().unwrap().version, 1);
}

#[test]
fn test_identity_like_configuration_is_rejected() {
    // every component kept and an envelope too wide to ever clamp
    let config = TrainingConfig {
        variance_retained: 1.0,
        envelope_margin: 1.0e6,
        ..small_config()
    };
    let result = pipeline(config).fit(
        TrainingSource::Synthetic { samples: 2000, seed: 3 },
        1,
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(EngineError::DegenerateModel { .. })));
}

#[test]
fn test_cancelled_run_installs_nothing() {
    let registry = ModelRegistry::in_memory();
    let p = pipeline(small_config());
    let token = CancelToken::new();
    token.cancel();

    assert!(matches!(
        p.run(&registry, p.synthetic_source(), &token),
        Err(EngineError::TrainingCancelled)
    ));
    assert!(matches!(registry.current(), Err(EngineError::NoModelLoaded)));
}

#[test]
fn test_concurrent_run_is_rejected() {
    let registry = ModelRegistry::in_memory();
    let p = pipeline(small_config());
    let _lease = registry.begin_write().unwrap();

    assert!(matches!(
        p.run(&registry, p.synthetic_source(), &CancelToken::new()),
        Err(EngineError::WriterBusy)
    ));
}

#[test]
fn test_retrain_bumps_version() {
    let registry = ModelRegistry::in_memory();
    let p = pipeline(small_config());

    let first = p.run(&registry, p.synthetic_source(), &CancelToken::new()).unwrap();
    let second = p
        .run(&registry, TrainingSource::Synthetic { samples: 2000, seed: 8 }, &CancelToken::new())
        .unwrap();
    assert_eq!(second.version, first.version + 1);
    assert_ne!(second.id, first.id);
    assert_eq!(registry.active_version(), 2);
}

#[test]
fn test_config_validation() {
    assert!(TrainingConfig::default().validate().is_ok());

    let bad = TrainingConfig {
        validation_fraction: 1.0,
        ..Default::default()
    };
    assert!(matches!(bad.validate(), Err(EngineError::InvalidConfig(_))));

    let bad = TrainingConfig {
        holdout_anomaly_fraction: 1.5,
        ..Default::default()
    };
    assert!(bad.validate().is_err());
}
