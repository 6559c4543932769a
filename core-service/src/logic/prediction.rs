//! Failure Predictor - degradation-based remaining life
//!
//! `hours = base_life / Π max(1, observed / nominal)` over temperature and
//! vibration. Stress only ever shortens life. The point estimate is always
//! deterministic; spread is reported separately by [`UncertaintyModel`].

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_BASE_LIFE_HOURS;
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::Feature;
use crate::logic::telemetry::TelemetrySample;

pub const NOMINAL_TEMPERATURE: f64 = 70.0;
pub const NOMINAL_VIBRATION: f64 = 0.02;

/// Below this many hours: failure
pub const FAILURE_HOURS: f64 = 24.0;
/// Below this many hours: warning
pub const WARNING_HOURS: f64 = 72.0;
/// Below this many hours: plan maintenance next week
pub const PLANNING_HOURS: f64 = 168.0;

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Normal,
    Warning,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Emergency,
    High,
    NormalHigh,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    ImmediateShutdown,
    ScheduleWithinThreeDays,
    PlanNextWeek,
    ContinueMonitoring,
}

impl MaintenanceAction {
    pub fn description(self) -> &'static str {
        match self {
            Self::ImmediateShutdown => "IMMEDIATE SHUTDOWN - Schedule emergency maintenance",
            Self::ScheduleWithinThreeDays => "Schedule maintenance within 3 days",
            Self::PlanNextWeek => "Plan maintenance next week",
            Self::ContinueMonitoring => "Continue monitoring - Normal operation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressFactors {
    pub temperature_factor: f64,
    pub vibration_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifeInterval {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePrediction {
    pub hours_to_failure: f64,
    pub class: FailureClass,
    pub action: MaintenanceAction,
    pub recommended_action: String,
    pub maintenance_window: MaintenanceWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<LifeInterval>,
    pub stress: StressFactors,
    /// Readings that were absent and taken as nominal
    pub assumed_nominal: Vec<String>,
}

// ============================================================================
// CONFIG
// ============================================================================

/// How spread around the point estimate is reported
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UncertaintyModel {
    PointEstimate,
    /// `hours · (1 ± relative)`
    Band { relative: f64 },
    /// 5th..95th percentile of `hours · N(1, relative)` over seeded draws
    MonteCarlo { relative: f64, draws: usize, seed: u64 },
}

impl Default for UncertaintyModel {
    fn default() -> Self {
        Self::Band { relative: 0.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorConfig {
    pub base_life_hours: f64,
    pub nominal_temperature: f64,
    pub nominal_vibration: f64,
    #[serde(default)]
    pub uncertainty: UncertaintyModel,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            base_life_hours: DEFAULT_BASE_LIFE_HOURS,
            nominal_temperature: NOMINAL_TEMPERATURE,
            nominal_vibration: NOMINAL_VIBRATION,
            uncertainty: UncertaintyModel::default(),
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("base_life_hours", self.base_life_hours),
            ("nominal_temperature", self.nominal_temperature),
            ("nominal_vibration", self.nominal_vibration),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(EngineError::InvalidConfig(format!("{} must be > 0, got {}", name, value)));
            }
        }

        match self.uncertainty {
            UncertaintyModel::PointEstimate => Ok(()),
            UncertaintyModel::Band { relative } | UncertaintyModel::MonteCarlo { relative, .. }
                if !(0.0..1.0).contains(&relative) =>
            {
                Err(EngineError::InvalidConfig(format!(
                    "relative uncertainty {} outside [0, 1)",
                    relative
                )))
            }
            UncertaintyModel::MonteCarlo { draws: 0, .. } => Err(EngineError::InvalidConfig(
                "Monte-Carlo uncertainty needs at least one draw".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

// ============================================================================
// PREDICTION
// ============================================================================

/// Half-open classification: exactly 24h is a warning, not a failure
pub fn classify(hours: f64) -> FailureClass {
    if hours < FAILURE_HOURS {
        FailureClass::Failure
    } else if hours < WARNING_HOURS {
        FailureClass::Warning
    } else {
        FailureClass::Normal
    }
}

/// Action and window for a remaining-life estimate, relative to `now`
pub fn plan(hours: f64, now: DateTime<Utc>) -> (MaintenanceAction, MaintenanceWindow) {
    if hours < FAILURE_HOURS {
        (
            MaintenanceAction::ImmediateShutdown,
            MaintenanceWindow {
                start: Some(now),
                end: Some(now + Duration::hours(6)),
                urgency: Urgency::Emergency,
            },
        )
    } else if hours < WARNING_HOURS {
        (
            MaintenanceAction::ScheduleWithinThreeDays,
            MaintenanceWindow {
                start: Some(now + Duration::hours(12)),
                end: Some(now + Duration::hours(48)),
                urgency: Urgency::High,
            },
        )
    } else if hours < PLANNING_HOURS {
        (
            MaintenanceAction::PlanNextWeek,
            MaintenanceWindow {
                start: None,
                end: None,
                urgency: Urgency::NormalHigh,
            },
        )
    } else {
        (
            MaintenanceAction::ContinueMonitoring,
            MaintenanceWindow {
                start: Some(now + Duration::days(7)),
                end: Some(now + Duration::days(10)),
                urgency: Urgency::Normal,
            },
        )
    }
}

fn stress_factor(observed: f64, nominal: f64) -> f64 {
    (observed / nominal).max(1.0)
}

fn interval(hours: f64, model: &UncertaintyModel) -> EngineResult<Option<LifeInterval>> {
    match *model {
        UncertaintyModel::PointEstimate => Ok(None),
        UncertaintyModel::Band { relative } => Ok(Some(LifeInterval {
            lower: hours * (1.0 - relative),
            upper: hours * (1.0 + relative),
        })),
        UncertaintyModel::MonteCarlo { relative, draws, seed } => {
            let normal = Normal::new(1.0, relative)
                .map_err(|e| EngineError::InvalidConfig(format!("uncertainty distribution: {}", e)))?;
            let mut rng = StdRng::seed_from_u64(seed);
            let mut lives: Vec<f64> = (0..draws.max(1))
                .map(|_| hours * normal.sample(&mut rng).max(0.01))
                .collect();
            lives.sort_by(|a, b| a.total_cmp(b));

            let last = lives.len() - 1;
            let at = |q: f64| lives[((last as f64) * q).round() as usize];
            Ok(Some(LifeInterval {
                lower: at(0.05),
                upper: at(0.95),
            }))
        }
    }
}

/// Remaining-life estimate for one sample
pub fn predict(
    sample: &TelemetrySample,
    config: &PredictorConfig,
    now: DateTime<Utc>,
) -> EngineResult<FailurePrediction> {
    sample.validate()?;
    let mut assumed_nominal = Vec::new();

    let temperature = sample.temperature.unwrap_or_else(|| {
        assumed_nominal.push(Feature::Temperature.name().to_string());
        config.nominal_temperature
    });
    let vibration = sample.vibration.unwrap_or_else(|| {
        assumed_nominal.push(Feature::Vibration.name().to_string());
        config.nominal_vibration
    });

    let stress = StressFactors {
        temperature_factor: stress_factor(temperature, config.nominal_temperature),
        vibration_factor: stress_factor(vibration, config.nominal_vibration),
    };
    let hours = config.base_life_hours / (stress.temperature_factor * stress.vibration_factor);

    let class = classify(hours);
    let (action, maintenance_window) = plan(hours, now);

    log::debug!(
        "{}: {:.1}h to failure ({:?}), stress temp={:.2} vib={:.2}",
        sample.device_id,
        hours,
        class,
        stress.temperature_factor,
        stress.vibration_factor
    );

    Ok(FailurePrediction {
        hours_to_failure: hours,
        class,
        action,
        recommended_action: action.description().to_string(),
        maintenance_window,
        interval: interval(hours, &config.uncertainty)?,
        stress,
        assumed_nominal,
    })
}
