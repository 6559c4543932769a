//! Model Snapshot - immutable bundle of fitted parameters
//!
//! Everything inference needs travels together so a reader can never pair
//! one run's scaler with another run's detectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::fusion::{fuse, AnomalyResult, FusionThresholds};
use super::isolation::IsolationForest;
use super::normalizer::NormalizerState;
use super::reconstruction::{ReconstructionModel, ReconstructionParams};
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::layout::{validate_feature_order, FEATURE_COUNT};
use crate::logic::features::FeatureVector;

/// Fit statistics recorded at training time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// Rows held out for accuracy (0 = fallback accuracy used)
    pub holdout_count: usize,
    pub holdout_p95_error: Option<f64>,
    /// Far-out rows mixed into the hold-out as positives
    #[serde(default)]
    pub injected_anomalies: usize,
    #[serde(default)]
    pub precision: Option<f64>,
    #[serde(default)]
    pub recall: Option<f64>,
    #[serde(default)]
    pub f1_score: Option<f64>,
    pub retained_components: usize,
    pub explained_variance: f64,
    /// Historical rows dropped by validation
    pub skipped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub id: Uuid,
    pub version: u64,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_order: Vec<String>,
    pub normalizer: NormalizerState,
    pub reconstruction: ReconstructionParams,
    pub outlier: IsolationForest,
    pub trained_at: DateTime<Utc>,
    pub training_sample_count: usize,
    pub synthetic: bool,
    /// Hold-out accuracy, reported as fusion confidence
    pub accuracy: f64,
    #[serde(default)]
    pub metrics: TrainingMetrics,
}

/// Lightweight description of a snapshot for logs and status output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub id: Uuid,
    pub version: u64,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub trained_at: DateTime<Utc>,
    pub training_sample_count: usize,
    pub synthetic: bool,
    pub accuracy: f64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
}

impl ModelSnapshot {
    /// Full consistency check: layout, sub-model shapes and accuracy range
    pub fn validate(&self) -> EngineResult<()> {
        validate_feature_order(self.feature_version, self.layout_hash, &self.feature_order)?;
        self.normalizer.validate()?;

        if self.normalizer.feature_version != self.feature_version
            || self.normalizer.layout_hash != self.layout_hash
        {
            return Err(EngineError::InvalidSnapshot(
                "normalizer was fit under a different layout".to_string(),
            ));
        }

        self.reconstruction.validate()?;
        if self.reconstruction.dimension() != FEATURE_COUNT {
            return Err(EngineError::InvalidSnapshot(format!(
                "reconstruction model expects {} features, layout has {}",
                self.reconstruction.dimension(),
                FEATURE_COUNT
            )));
        }

        self.outlier.validate()?;
        if self.outlier.dimension != FEATURE_COUNT {
            return Err(EngineError::InvalidSnapshot(format!(
                "outlier model expects {} features, layout has {}",
                self.outlier.dimension, FEATURE_COUNT
            )));
        }

        let rates = [
            ("accuracy", Some(self.accuracy)),
            ("precision", self.metrics.precision),
            ("recall", self.metrics.recall),
            ("f1_score", self.metrics.f1_score),
        ];
        for (name, value) in rates {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(EngineError::InvalidSnapshot(format!("{} {} outside [0, 1]", name, v)));
                }
            }
        }

        Ok(())
    }

    pub fn normalize(&self, vector: &FeatureVector) -> EngineResult<[f64; FEATURE_COUNT]> {
        self.normalizer.transform(vector)
    }

    /// Score an encoded vector against both detectors and fuse
    pub fn detect(&self, vector: &FeatureVector, thresholds: &FusionThresholds) -> EngineResult<AnomalyResult> {
        let normalized = self.normalize(vector)?;
        let reconstruction_error = self.reconstruction.score(&normalized)?;
        let outlier_score = self.outlier.score(&normalized)?;

        log::debug!(
            "snapshot v{}: recon={:.6} outlier={:.4}",
            self.version,
            reconstruction_error,
            outlier_score
        );

        let mut result = fuse(reconstruction_error, outlier_score, self.accuracy, thresholds);
        result.model_version = self.version;
        Ok(result)
    }

    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            id: self.id,
            version: self.version,
            feature_version: self.feature_version,
            layout_hash: self.layout_hash,
            trained_at: self.trained_at,
            training_sample_count: self.training_sample_count,
            synthetic: self.synthetic,
            accuracy: self.accuracy,
            precision: self.metrics.precision,
            recall: self.metrics.recall,
            f1_score: self.metrics.f1_score,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::tagged_snapshot;
    use super::*;

    #[test]
    fn test_tagged_snapshot_is_valid() {
        let s = tagged_snapshot(3);
        assert!(s.validate().is_ok());
        assert_eq!(s.info().version, 3);
    }

    #[test]
    fn test_validate_rejects_foreign_layout() {
        let mut s = tagged_snapshot(1);
        s.layout_hash ^= 1;
        assert!(matches!(s.validate(), Err(EngineError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_validate_rejects_mismatched_normalizer() {
        let mut s = tagged_snapshot(1);
        s.normalizer.mean.pop();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_accuracy() {
        let mut s = tagged_snapshot(1);
        s.accuracy = 1.5;
        assert!(matches!(s.validate(), Err(EngineError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_validate_rejects_bad_recall() {
        let mut s = tagged_snapshot(1);
        s.metrics.recall = Some(-0.1);
        assert!(matches!(s.validate(), Err(EngineError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_info_carries_performance() {
        let mut s = tagged_snapshot(1);
        s.metrics.precision = Some(0.8);
        s.metrics.recall = Some(1.0);
        s.metrics.f1_score = Some(0.889);

        let info = s.info();
        assert_eq!(info.precision, Some(0.8));
        assert_eq!(info.recall, Some(1.0));
        assert_eq!(info.f1_score, Some(0.889));
    }

    #[test]
    fn test_metrics_default_when_absent_from_json() {
        let metrics: TrainingMetrics = serde_json::from_str(
            r#"{"holdout_count":10,"holdout_p95_error":0.01,"retained_components":5,"explained_variance":1.0,"skipped_rows":0}"#,
        )
        .unwrap();
        assert_eq!(metrics.injected_anomalies, 0);
        assert!(metrics.recall.is_none());
    }

    #[test]
    fn test_detect_stamps_version() {
        let s = tagged_snapshot(7);
        let v = FeatureVector::from_values([7.0; FEATURE_COUNT]);
        let result = s.detect(&v, &FusionThresholds::default()).unwrap();
        assert_eq!(result.model_version, 7);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_json_round_trip() {
        let s = tagged_snapshot(2);
        let json = serde_json::to_string(&s).unwrap();
        let back: ModelSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
