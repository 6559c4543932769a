//! Synthetic bootstrap data
//!
//! Per-feature normals around nominal operation. Only used to bootstrap a
//! model when no history exists; snapshots built from it are flagged
//! `synthetic`.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::Feature;
use crate::logic::telemetry::{sensor_range, TelemetrySample};

pub const SYNTHETIC_DEVICE_ID: &str = "synthetic";

/// `(mean, std)` of each feature during normal operation
pub fn nominal_distribution(feature: Feature) -> (f64, f64) {
    match feature {
        Feature::Temperature => (70.0, 5.0),
        Feature::Vibration => (0.02, 0.005),
        Feature::Rpm => (1500.0, 50.0),
        Feature::Pressure => (100.0, 10.0),
        Feature::PowerConsumption => (2.4, 0.3),
    }
}

/// Draw `count` complete samples, one second apart from `start`
pub fn generate(count: usize, seed: u64, start: DateTime<Utc>) -> EngineResult<Vec<TelemetrySample>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut distributions = Vec::with_capacity(Feature::ALL.len());
    for feature in Feature::ALL {
        let (mean, std) = nominal_distribution(feature);
        let normal = Normal::new(mean, std)
            .map_err(|e| EngineError::InvalidConfig(format!("{} distribution: {}", feature.name(), e)))?;
        distributions.push((feature, normal));
    }

    let samples = (0..count)
        .map(|i| {
            let timestamp = start + Duration::seconds(i as i64);
            distributions
                .iter()
                .fold(TelemetrySample::new(SYNTHETIC_DEVICE_ID, timestamp), |sample, (feature, normal)| {
                    let range = sensor_range(*feature);
                    let mut value = normal.sample(&mut rng).max(range.min);
                    if let Some(max) = range.max {
                        value = value.min(max);
                    }
                    sample.with(*feature, value)
                })
        })
        .collect();

    Ok(samples)
}
