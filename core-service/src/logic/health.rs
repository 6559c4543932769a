//! Health Scorer - rule-based 0-100 operating stress summary
//!
//! Pure function of the raw sample. No learned state, no model required.

use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::Feature;
use crate::logic::telemetry::TelemetrySample;

pub const MAX_HEALTH: f64 = 100.0;

/// Penalty shape for one factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    pub setpoint: f64,
    pub tolerance: f64,
    pub weight: f64,
    /// Only deviation above the setpoint is penalized
    pub one_sided: bool,
}

impl FactorSpec {
    pub const fn symmetric(setpoint: f64, tolerance: f64, weight: f64) -> Self {
        Self { setpoint, tolerance, weight, one_sided: false }
    }

    pub const fn upper(setpoint: f64, tolerance: f64, weight: f64) -> Self {
        Self { setpoint, tolerance, weight, one_sided: true }
    }

    pub fn penalty(&self, value: f64) -> f64 {
        let deviation = if self.one_sided {
            value - self.setpoint
        } else {
            (value - self.setpoint).abs()
        };
        (deviation / self.tolerance * self.weight).max(0.0)
    }
}

/// What to do when a scored factor has no reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "penalty", rename_all = "snake_case")]
pub enum MissingFactorPolicy {
    /// Zero penalty; the factor is listed in `missing_factors`
    #[default]
    Ignore,
    /// Fixed penalty per missing factor
    Penalize(f64),
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    pub temperature: FactorSpec,
    pub vibration: FactorSpec,
    pub rpm: FactorSpec,
    pub pressure: FactorSpec,
    #[serde(default)]
    pub missing: MissingFactorPolicy,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            temperature: FactorSpec::symmetric(70.0, 30.0, 30.0),
            vibration: FactorSpec::upper(0.02, 0.05, 40.0),
            rpm: FactorSpec::symmetric(1500.0, 200.0, 20.0),
            pressure: FactorSpec::symmetric(100.0, 50.0, 10.0),
            missing: MissingFactorPolicy::Ignore,
        }
    }
}

impl HealthConfig {
    pub fn factors(&self) -> [(Feature, &FactorSpec); 4] {
        [
            (Feature::Temperature, &self.temperature),
            (Feature::Vibration, &self.vibration),
            (Feature::Rpm, &self.rpm),
            (Feature::Pressure, &self.pressure),
        ]
    }

    pub fn validate(&self) -> EngineResult<()> {
        for (feature, spec) in self.factors() {
            if !(spec.tolerance > 0.0) || !spec.weight.is_finite() || spec.weight < 0.0 {
                return Err(EngineError::InvalidConfig(format!(
                    "health factor '{}' needs tolerance > 0 and weight >= 0",
                    feature.name()
                )));
            }
        }
        if let MissingFactorPolicy::Penalize(p) = self.missing {
            if !(p >= 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "missing-factor penalty {} must be >= 0",
                    p
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorPenalty {
    pub factor: String,
    /// `None` when the reading was absent
    pub value: Option<f64>,
    pub penalty: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub penalties: Vec<FactorPenalty>,
    pub missing_factors: Vec<String>,
}

/// Score a sample: 100 minus factor penalties, clamped, one decimal.
/// Fails with `InvalidSample` for non-finite or out-of-range readings.
pub fn score(sample: &TelemetrySample, config: &HealthConfig) -> EngineResult<HealthScore> {
    sample.validate()?;

    let mut total = MAX_HEALTH;
    let mut penalties = Vec::new();
    let mut missing_factors = Vec::new();

    for (feature, spec) in config.factors() {
        match sample.reading(feature) {
            Some(value) => {
                let penalty = spec.penalty(value);
                total -= penalty;
                penalties.push(FactorPenalty {
                    factor: feature.name().to_string(),
                    value: Some(value),
                    penalty,
                });
            }
            None => {
                match config.missing {
                    MissingFactorPolicy::Ignore => {}
                    MissingFactorPolicy::Penalize(p) => {
                        total -= p;
                        penalties.push(FactorPenalty {
                            factor: feature.name().to_string(),
                            value: None,
                            penalty: p,
                        });
                    }
                    MissingFactorPolicy::Reject => return Err(EngineError::MissingFeature(feature.name())),
                }
                missing_factors.push(feature.name().to_string());
            }
        }
    }

    Ok(HealthScore {
        score: round_one_decimal(total.clamp(0.0, MAX_HEALTH)),
        penalties,
        missing_factors,
    })
}

fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at_setpoints() -> TelemetrySample {
        TelemetrySample::new("mill-3", Utc::now())
            .with_temperature(70.0)
            .with_vibration(0.02)
            .with_rpm(1500.0)
            .with_pressure(100.0)
    }

    #[test]
    fn test_setpoints_score_full() {
        let h = score(&at_setpoints(), &HealthConfig::default()).unwrap();
        assert_eq!(h.score, 100.0);
        assert!(h.missing_factors.is_empty());
        assert!(h.penalties.iter().all(|p| p.penalty == 0.0));
    }

    #[test]
    fn test_scoring_is_pure() {
        let s = at_setpoints().with_temperature(83.0).with_rpm(1390.0);
        let config = HealthConfig::default();
        assert_eq!(score(&s, &config).unwrap(), score(&s, &config).unwrap());
    }

    #[test]
    fn test_high_vibration_clamps_to_zero() {
        let s = TelemetrySample::new("mill-3", Utc::now())
            .with_temperature(70.0)
            .with_vibration(0.5);
        let h = score(&s, &HealthConfig::default()).unwrap();
        assert_eq!(h.score, 0.0);

        let vibration = h.penalties.iter().find(|p| p.factor == "vibration").unwrap();
        assert!(vibration.penalty > 100.0);
        let temperature = h.penalties.iter().find(|p| p.factor == "temperature").unwrap();
        assert_eq!(temperature.penalty, 0.0);
    }

    #[test]
    fn test_vibration_is_one_sided() {
        let s = at_setpoints().with_vibration(0.0);
        assert_eq!(score(&s, &HealthConfig::default()).unwrap().score, 100.0);
    }

    #[test]
    fn test_temperature_penalty_and_rounding() {
        // |85 - 70| / 30 * 30 = 15
        let s = at_setpoints().with_temperature(85.0);
        assert_eq!(score(&s, &HealthConfig::default()).unwrap().score, 85.0);

        // |1433 - 1500| / 200 * 20 = 6.7
        let s = at_setpoints().with_rpm(1433.0);
        assert_eq!(score(&s, &HealthConfig::default()).unwrap().score, 93.3);
    }

    #[test]
    fn test_penalties_decrease_score_monotonically() {
        let config = HealthConfig::default();
        let mut last = f64::INFINITY;
        for t in [70.0, 75.0, 80.0, 90.0, 110.0] {
            let h = score(&at_setpoints().with_temperature(t), &config).unwrap();
            assert!(h.score <= last);
            last = h.score;
        }
    }

    #[test]
    fn test_invalid_reading_is_rejected() {
        let config = HealthConfig::default();
        let nan = at_setpoints().with_vibration(f64::NAN);
        assert!(matches!(score(&nan, &config), Err(EngineError::InvalidSample(_))));

        let hot = at_setpoints().with_temperature(400.0);
        assert!(matches!(score(&hot, &config), Err(EngineError::InvalidSample(_))));
    }

    #[test]
    fn test_missing_factor_policies() {
        let sparse = TelemetrySample::new("mill-3", Utc::now()).with_temperature(70.0);

        let ignore = score(&sparse, &HealthConfig::default()).unwrap();
        assert_eq!(ignore.score, 100.0);
        assert_eq!(ignore.missing_factors, vec!["vibration", "rpm", "pressure"]);

        let penalize = HealthConfig {
            missing: MissingFactorPolicy::Penalize(5.0),
            ..Default::default()
        };
        assert_eq!(score(&sparse, &penalize).unwrap().score, 85.0);

        let reject = HealthConfig {
            missing: MissingFactorPolicy::Reject,
            ..Default::default()
        };
        assert!(matches!(
            score(&sparse, &reject),
            Err(EngineError::MissingFeature("vibration"))
        ));
    }

    #[test]
    fn test_power_is_not_scored() {
        let s = at_setpoints().with_power_consumption(50.0);
        assert_eq!(score(&s, &HealthConfig::default()).unwrap().score, 100.0);
    }

    #[test]
    fn test_validate_rejects_zero_tolerance() {
        let mut config = HealthConfig::default();
        assert!(config.validate().is_ok());
        config.rpm.tolerance = 0.0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }
}
