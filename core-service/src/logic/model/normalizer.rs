//! Normalizer - per-feature standardization
//!
//! `fit` is the only constructor of a [`NormalizerState`] and returns a
//! complete value; nothing is mutated afterwards, so inference never sees a
//! half-fitted scaler.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::layout::{
    layout_hash, validate_feature_order, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION,
};
use crate::logic::features::FeatureVector;

/// Smallest scale used for a feature, so a constant column never divides by ~0
pub const STD_FLOOR: f64 = 1e-6;

/// Minimum number of samples for a meaningful scale
pub const MIN_FIT_SAMPLES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerState {
    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_order: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    /// Number of vectors the state was fit on
    pub fitted_on: usize,
}

impl NormalizerState {
    /// Fit mean / population std per feature, using present readings only
    pub fn fit(samples: &[FeatureVector]) -> EngineResult<Self> {
        if samples.len() < MIN_FIT_SAMPLES {
            return Err(EngineError::InsufficientData {
                required: MIN_FIT_SAMPLES,
                actual: samples.len(),
            });
        }
        for sample in samples {
            sample.validate()?;
        }

        let mut mean = vec![0.0; FEATURE_COUNT];
        let mut scale = vec![1.0; FEATURE_COUNT];

        for i in 0..FEATURE_COUNT {
            let column: Vec<f64> = samples.iter().filter_map(|s| s.get(i)).collect();

            if column.len() < MIN_FIT_SAMPLES {
                log::warn!(
                    "Feature '{}' has {} readings in {} samples; leaving it unscaled",
                    FEATURE_LAYOUT[i],
                    column.len(),
                    samples.len()
                );
                continue;
            }

            let n = column.len() as f64;
            let m = column.iter().sum::<f64>() / n;
            let variance = column.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;

            mean[i] = m;
            scale[i] = variance.sqrt().max(STD_FLOOR);
        }

        Ok(Self {
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            feature_order: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            mean,
            scale,
            fitted_on: samples.len(),
        })
    }

    /// Check persisted state against the current layout
    pub fn validate(&self) -> EngineResult<()> {
        validate_feature_order(self.feature_version, self.layout_hash, &self.feature_order)?;
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(EngineError::SchemaMismatch {
                expected: format!("{} features", FEATURE_COUNT),
                actual: format!("{} means / {} scales", self.mean.len(), self.scale.len()),
            });
        }
        Ok(())
    }

    /// Standardize one vector. Absent features map to 0.0 (the fitted mean).
    pub fn transform(&self, vector: &FeatureVector) -> EngineResult<[f64; FEATURE_COUNT]> {
        if vector.version != self.feature_version || vector.layout_hash != self.layout_hash {
            return Err(EngineError::SchemaMismatch {
                expected: format!("layout v{} (hash {:08x})", self.feature_version, self.layout_hash),
                actual: format!("layout v{} (hash {:08x})", vector.version, vector.layout_hash),
            });
        }
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(EngineError::SchemaMismatch {
                expected: format!("{} features", FEATURE_COUNT),
                actual: format!("{} features", self.mean.len()),
            });
        }

        let mut out = [0.0; FEATURE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            if let Some(x) = vector.get(i) {
                *slot = (x - self.mean[i]) / self.scale[i];
            }
        }
        Ok(out)
    }

    /// Standardize a batch into an `n x FEATURE_COUNT` matrix
    pub fn transform_all(&self, vectors: &[FeatureVector]) -> EngineResult<Array2<f64>> {
        let mut flat = Vec::with_capacity(vectors.len() * FEATURE_COUNT);
        for v in vectors {
            flat.extend_from_slice(&self.transform(v)?);
        }
        Array2::from_shape_vec((vectors.len(), FEATURE_COUNT), flat)
            .map_err(|e| EngineError::InvalidSnapshot(format!("normalized matrix shape: {}", e)))
    }
}
