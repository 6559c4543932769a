//! Telemetry Sample - Raw reading from a device
//!
//! A sample is what ingress hands to the engine. Every reading is optional;
//! `encode` turns it into a [`FeatureVector`] with a presence mask.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::{Feature, FeatureVector};

// ============================================================================
// SENSOR LIMITS
// ============================================================================

/// Physically plausible range per sensor. `None` upper bound = unbounded.
#[derive(Debug, Clone, Copy)]
pub struct SensorRange {
    pub min: f64,
    pub max: Option<f64>,
}

pub fn sensor_range(feature: Feature) -> SensorRange {
    match feature {
        Feature::Temperature => SensorRange { min: -50.0, max: Some(150.0) },
        Feature::Vibration => SensorRange { min: 0.0, max: Some(1.0) },
        Feature::Rpm => SensorRange { min: 0.0, max: Some(10_000.0) },
        Feature::Pressure => SensorRange { min: 0.0, max: None },
        Feature::PowerConsumption => SensorRange { min: 0.0, max: None },
    }
}

// ============================================================================
// SAMPLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub vibration: Option<f64>,
    #[serde(default)]
    pub rpm: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub power_consumption: Option<f64>,
}

impl TelemetrySample {
    pub fn new(device_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            temperature: None,
            vibration: None,
            rpm: None,
            pressure: None,
            power_consumption: None,
        }
    }

    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        *self.slot_mut(feature) = Some(value);
        self
    }

    pub fn with_temperature(self, value: f64) -> Self {
        self.with(Feature::Temperature, value)
    }

    pub fn with_vibration(self, value: f64) -> Self {
        self.with(Feature::Vibration, value)
    }

    pub fn with_rpm(self, value: f64) -> Self {
        self.with(Feature::Rpm, value)
    }

    pub fn with_pressure(self, value: f64) -> Self {
        self.with(Feature::Pressure, value)
    }

    pub fn with_power_consumption(self, value: f64) -> Self {
        self.with(Feature::PowerConsumption, value)
    }

    pub fn reading(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::Temperature => self.temperature,
            Feature::Vibration => self.vibration,
            Feature::Rpm => self.rpm,
            Feature::Pressure => self.pressure,
            Feature::PowerConsumption => self.power_consumption,
        }
    }

    fn slot_mut(&mut self, feature: Feature) -> &mut Option<f64> {
        match feature {
            Feature::Temperature => &mut self.temperature,
            Feature::Vibration => &mut self.vibration,
            Feature::Rpm => &mut self.rpm,
            Feature::Pressure => &mut self.pressure,
            Feature::PowerConsumption => &mut self.power_consumption,
        }
    }

    /// Reject non-finite or physically implausible readings
    pub fn validate(&self) -> EngineResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(EngineError::InvalidSample("device_id is empty".to_string()));
        }

        for feature in Feature::ALL {
            let Some(value) = self.reading(feature) else {
                continue;
            };

            if !value.is_finite() {
                return Err(EngineError::InvalidSample(format!(
                    "{} is not a finite number",
                    feature.name()
                )));
            }

            let range = sensor_range(feature);
            let above_max = range.max.map_or(false, |max| value > max);
            if value < range.min || above_max {
                return Err(EngineError::InvalidSample(format!(
                    "{}={} outside [{}, {}]",
                    feature.name(),
                    value,
                    range.min,
                    range.max.map_or("inf".to_string(), |m| m.to_string())
                )));
            }
        }

        Ok(())
    }

    /// Encode into the fixed layout; absent readings stay 0.0 and unmarked
    pub fn encode(&self) -> FeatureVector {
        let mut vector = FeatureVector::new();
        for feature in Feature::ALL {
            if let Some(value) = self.reading(feature) {
                vector.set(feature.index(), value);
            }
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySample {
        TelemetrySample::new("press-01", Utc::now())
    }

    #[test]
    fn test_encode_tracks_absence() {
        let s = sample().with_temperature(70.0).with_vibration(0.5);
        let v = s.encode();

        assert_eq!(v.feature(Feature::Temperature), Some(70.0));
        assert_eq!(v.feature(Feature::Vibration), Some(0.5));
        assert_eq!(v.values[Feature::Rpm.index()], 0.0);
        assert!(!v.is_present(Feature::Rpm));
        assert_eq!(v.missing(), vec!["rpm", "pressure", "power_consumption"]);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(sample().with_temperature(70.0).with_vibration(0.02).validate().is_ok());
        assert!(sample().with_temperature(151.0).validate().is_err());
        assert!(sample().with_vibration(1.5).validate().is_err());
        assert!(sample().with_rpm(-1.0).validate().is_err());
        assert!(sample().with_pressure(f64::NAN).validate().is_err());
        assert!(sample().with_power_consumption(1.0e6).validate().is_ok());
    }

    #[test]
    fn test_validate_device_id() {
        let s = TelemetrySample::new("  ", Utc::now());
        assert!(matches!(s.validate(), Err(EngineError::InvalidSample(_))));
    }

    #[test]
    fn test_deserialize_with_missing_fields() {
        let json = r#"{"device_id":"pump-7","timestamp":"2024-05-01T12:00:00Z","temperature":72.5,"rpm":1480}"#;
        let s: TelemetrySample = serde_json::from_str(json).unwrap();
        assert_eq!(s.temperature, Some(72.5));
        assert_eq!(s.rpm, Some(1480.0));
        assert_eq!(s.pressure, None);
    }
}
