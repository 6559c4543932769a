//! Engine configuration
//!
//! Groups every tunable of the engine. Defaults come from `constants`;
//! `from_env` applies `EHC_*` overrides and validates the result.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::health::HealthConfig;
use crate::logic::model::FusionThresholds;
use crate::logic::prediction::PredictorConfig;
use crate::logic::training::TrainingConfig;

/// What anomaly detection does with absent readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsencePolicy {
    /// Score absent features at their training mean and report them
    #[default]
    ImputeMean,
    /// Fail with `MissingFeature`
    Reject,
}

impl AbsencePolicy {
    pub fn parse(name: &str) -> EngineResult<Self> {
        match name.trim().to_lowercase().as_str() {
            "impute" | "impute_mean" | "mean" => Ok(Self::ImputeMean),
            "reject" => Ok(Self::Reject),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown absence policy '{}' (expected impute|reject)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub fusion: FusionThresholds,
    pub health: HealthConfig,
    pub predictor: PredictorConfig,
    pub training: TrainingConfig,
    pub absence: AbsencePolicy,
    /// `None` = platform data dir
    pub snapshot_path: Option<PathBuf>,
}

impl EngineConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> EngineResult<Self> {
        let mut config = Self::default();

        config.fusion = FusionThresholds::new(
            constants::get_recon_threshold(),
            constants::get_outlier_threshold(),
        );
        config.training.min_samples = constants::get_min_training_samples();
        config.training.synthetic_samples = constants::get_synthetic_samples();
        config.training.seed = constants::get_training_seed();
        config.training.timeout = constants::get_training_timeout();
        config.predictor.base_life_hours = constants::get_base_life_hours();
        config.absence = AbsencePolicy::parse(&constants::get_absence_policy())?;
        config.snapshot_path = constants::get_snapshot_path();

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.fusion.reconstruction.is_finite() || self.fusion.reconstruction < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "reconstruction threshold {} must be >= 0",
                self.fusion.reconstruction
            )));
        }
        if !(-1.0..=0.0).contains(&self.fusion.outlier) {
            return Err(EngineError::InvalidConfig(format!(
                "outlier threshold {} must be in [-1, 0]",
                self.fusion.outlier
            )));
        }

        self.health.validate()?;
        self.predictor.validate()?;
        self.training.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fusion.reconstruction, constants::DEFAULT_RECON_THRESHOLD);
        assert_eq!(config.fusion.outlier, constants::DEFAULT_OUTLIER_THRESHOLD);
        assert_eq!(config.training.min_samples, constants::DEFAULT_MIN_TRAINING_SAMPLES);
        assert_eq!(config.predictor.base_life_hours, constants::DEFAULT_BASE_LIFE_HOURS);
        assert_eq!(config.absence, AbsencePolicy::ImputeMean);
    }

    #[test]
    fn test_absence_policy_parse() {
        assert_eq!(AbsencePolicy::parse("impute").unwrap(), AbsencePolicy::ImputeMean);
        assert_eq!(AbsencePolicy::parse(" REJECT ").unwrap(), AbsencePolicy::Reject);
        assert!(matches!(AbsencePolicy::parse("zero"), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = EngineConfig::default();
        config.fusion.outlier = 0.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.fusion.reconstruction = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serializes() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
