//! Analyzer - per-sample entry point
//!
//! Takes a ready [`TelemetrySample`] and produces any of the three signals.
//! Health and prediction need no model; anomaly detection reads the active
//! snapshot from the injected registry and fails with `ModelUnavailable`
//! rather than reporting "normal" when there is none.


use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::config::{AbsencePolicy, EngineConfig};
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::health::{self, HealthScore};
use crate::logic::model::AnomalyResult;
use crate::logic::prediction::{self, FailurePrediction};
use crate::logic::registry::ModelRegistry;
use crate::logic::telemetry::TelemetrySample;

/// Which signal(s) to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Full,
    Anomaly,
    Health,
    Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullReport {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub anomaly: AnomalyResult,
    pub health: HealthScore,
    pub prediction: FailurePrediction,
    pub model_version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Full(FullReport),
    Anomaly(AnomalyResult),
    Health(HealthScore),
    Prediction(FailurePrediction),
}

pub struct Analyzer {
    registry: Arc<ModelRegistry>,
    config: EngineConfig,
}

impl Analyzer {
    pub fn new(registry: Arc<ModelRegistry>, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn detect_anomaly(&self, sample: &TelemetrySample) -> EngineResult<AnomalyResult> {
        sample.validate()?;

        let snapshot = self.registry.current().map_err(|e| match e {
            EngineError::NoModelLoaded => {
                EngineError::ModelUnavailable("no snapshot installed; train or load a model first".to_string())
            }
            other => other,
        })?;

        let vector = sample.encode();
        let missing = vector.missing();
        if let (AbsencePolicy::Reject, Some(&first)) = (self.config.absence, missing.first()) {
            return Err(EngineError::MissingFeature(first));
        }

        let mut result = snapshot.detect(&vector, &self.config.fusion)?;
        result.imputed_features = missing.into_iter().map(String::from).collect();

        if result.is_anomaly {
            log::debug!(
                "{}: anomaly (recon={:.4}, outlier={:.3}, by {:?})",
                sample.device_id,
                result.reconstruction_error,
                result.outlier_score,
                result.triggered_by
            );
        }
        Ok(result)
    }

    pub fn health(&self, sample: &TelemetrySample) -> EngineResult<HealthScore> {
        health::score(sample, &self.config.health)
    }

    /// Prediction windows are anchored at the sample's own timestamp
    pub fn predict(&self, sample: &TelemetrySample) -> EngineResult<FailurePrediction> {
        prediction::predict(sample, &self.config.predictor, sample.timestamp)
    }

    pub fn evaluate(&self, sample: &TelemetrySample) -> EngineResult<FullReport> {
        let anomaly = self.detect_anomaly(sample)?;
        let health = self.health(sample)?;
        let prediction = self.predict(sample)?;

        Ok(FullReport {
            device_id: sample.device_id.clone(),
            timestamp: sample.timestamp,
            model_version: anomaly.model_version,
            anomaly,
            health,
            prediction,
        })
    }

    pub fn analyze(&self, sample: &TelemetrySample, kind: AnalysisKind) -> EngineResult<AnalysisOutcome> {
        match kind {
            AnalysisKind::Full => self.evaluate(sample).map(AnalysisOutcome::Full),
            AnalysisKind::Anomaly => self.detect_anomaly(sample).map(AnalysisOutcome::Anomaly),
            AnalysisKind::Health => self.health(sample).map(AnalysisOutcome::Health),
            AnalysisKind::Prediction => self.predict(sample).map(AnalysisOutcome::Prediction),
        }
    }

    /// Each sample is scored independently; one failure does not affect the rest
    pub fn evaluate_batch(&self, samples: &[TelemetrySample]) -> Vec<EngineResult<FullReport>> {
        samples.iter().map(|s| self.evaluate(s)).collect()
    }
}
