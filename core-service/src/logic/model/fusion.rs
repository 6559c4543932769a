//! Anomaly Fusion - threshold combination of both detectors
//!
//! Stateless: a sample is anomalous when either detector crosses its
//! threshold. `confidence` is the snapshot's historical accuracy, not a
//! per-sample probability.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_OUTLIER_THRESHOLD, DEFAULT_RECON_THRESHOLD};

/// Threshold Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionThresholds {
    /// Reconstruction error above this is anomalous
    pub reconstruction: f64,

    /// Outlier score below this is anomalous (lower = more outlying)
    pub outlier: f64,
}

impl Default for FusionThresholds {
    fn default() -> Self {
        Self {
            reconstruction: DEFAULT_RECON_THRESHOLD,
            outlier: DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

impl FusionThresholds {
    pub fn new(reconstruction: f64, outlier: f64) -> Self {
        Self { reconstruction, outlier }
    }
}

/// Which detector flagged a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Reconstruction,
    Outlier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub is_anomaly: bool,
    pub reconstruction_error: f64,
    pub outlier_score: f64,
    pub confidence: f64,
    pub triggered_by: Vec<DetectorKind>,
    /// Features that were absent and scored at their training mean
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imputed_features: Vec<String>,
    pub model_version: u64,
}

/// Combine both detector outputs into one decision
pub fn fuse(
    reconstruction_error: f64,
    outlier_score: f64,
    confidence: f64,
    thresholds: &FusionThresholds,
) -> AnomalyResult {
    let mut triggered_by = Vec::new();
    if reconstruction_error > thresholds.reconstruction {
        triggered_by.push(DetectorKind::Reconstruction);
    }
    if outlier_score < thresholds.outlier {
        triggered_by.push(DetectorKind::Outlier);
    }

    AnomalyResult {
        is_anomaly: !triggered_by.is_empty(),
        reconstruction_error: reconstruction_error.max(0.0),
        outlier_score,
        confidence: confidence.clamp(0.0, 1.0),
        triggered_by,
        imputed_features: Vec::new(),
        model_version: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let t = FusionThresholds::default();
        assert_eq!(t.reconstruction, 0.02);
        assert_eq!(t.outlier, -0.5);
    }

    #[test]
    fn test_normal_sample() {
        let r = fuse(0.001, -0.4, 0.924, &FusionThresholds::default());
        assert!(!r.is_anomaly);
        assert!(r.triggered_by.is_empty());
        assert_eq!(r.confidence, 0.924);
    }

    #[test]
    fn test_either_detector_triggers() {
        let t = FusionThresholds::default();

        let recon_only = fuse(0.5, -0.4, 0.9, &t);
        assert!(recon_only.is_anomaly);
        assert_eq!(recon_only.triggered_by, vec![DetectorKind::Reconstruction]);

        let outlier_only = fuse(0.001, -0.7, 0.9, &t);
        assert!(outlier_only.is_anomaly);
        assert_eq!(outlier_only.triggered_by, vec![DetectorKind::Outlier]);

        let both = fuse(0.5, -0.7, 0.9, &t);
        assert_eq!(both.triggered_by.len(), 2);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let t = FusionThresholds::default();
        assert!(!fuse(0.02, -0.5, 1.0, &t).is_anomaly);
    }

    #[test]
    fn test_custom_thresholds() {
        let strict = FusionThresholds::new(0.0005, -0.45);
        assert!(fuse(0.001, -0.4, 1.0, &strict).is_anomaly);
    }
}
