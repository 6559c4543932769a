//! Reconstruction Model - learned envelope of normal operation
//!
//! Any model that reproduces a normalized vector and reports the mean squared
//! difference satisfies [`ReconstructionModel`]. The shipped implementation
//! is a PCA envelope:
//!
//! 1. diagonalise the covariance of the normalized training matrix
//! 2. keep the leading components that explain `variance_retained`
//! 3. record each component's training code range, widened by
//!    `envelope_margin` standard deviations
//! 4. reconstruct = project, clamp codes into the envelope, project back
//!
//! Vectors inside the training envelope reconstruct almost exactly; vectors
//! off the learned subspace or outside the envelope do not. Parameters are
//! O(d·k), never per-sample.
//!
//! Compression only happens when features are correlated. On independent
//! features every component is needed to reach `variance_retained`, k = d,
//! and the model reduces to a box clamp in the rotated space: points inside
//! the training ranges score ~0 and points beyond them score the mean squared
//! overshoot. The degeneracy probe still rejects a box too wide to clamp.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MIN_TRAINING_SAMPLES;
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::training::CancelToken;

pub const DEFAULT_VARIANCE_RETAINED: f64 = 0.999;
pub const DEFAULT_ENVELOPE_MARGIN: f64 = 0.5;

/// Distance (in normalized units) of the axis probes used by the degeneracy guard
pub const PROBE_MAGNITUDE: f64 = 25.0;

const JACOBI_MAX_SWEEPS: usize = 64;
const JACOBI_TOLERANCE: f64 = 1e-20;

// ============================================================================
// CONTRACT
// ============================================================================

/// Reconstruction contract. Implementations must be pure: same input, same
/// output, callable from many threads against one shared instance.
pub trait ReconstructionModel: Send + Sync {
    fn dimension(&self) -> usize;

    fn reconstruct(&self, x: &[f64]) -> EngineResult<Vec<f64>>;

    /// Mean squared difference between `x` and its reconstruction
    fn score(&self, x: &[f64]) -> EngineResult<f64> {
        let reconstructed = self.reconstruct(x)?;
        Ok(mean_squared_error(x, &reconstructed))
    }
}

pub fn mean_squared_error(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / a.len() as f64
}

/// Smallest reconstruction error over ±`magnitude` probes along every axis.
///
/// An identity-like model reproduces the probes and returns ~0 here.
pub fn degeneracy_probe(model: &dyn ReconstructionModel, magnitude: f64) -> EngineResult<f64> {
    let d = model.dimension();
    let mut smallest = f64::INFINITY;

    for axis in 0..d {
        for sign in [1.0, -1.0] {
            let mut probe = vec![0.0; d];
            probe[axis] = sign * magnitude;
            smallest = smallest.min(model.score(&probe)?);
        }
    }

    Ok(smallest)
}

// ============================================================================
// PCA ENVELOPE
// ============================================================================

/// Trainer settings for the PCA envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaEnvelope {
    pub min_samples: usize,
    pub variance_retained: f64,
    pub envelope_margin: f64,
}

impl Default for PcaEnvelope {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_TRAINING_SAMPLES,
            variance_retained: DEFAULT_VARIANCE_RETAINED,
            envelope_margin: DEFAULT_ENVELOPE_MARGIN,
        }
    }
}

impl PcaEnvelope {
    pub fn fit(&self, data: ArrayView2<f64>, cancel: &CancelToken) -> EngineResult<ReconstructionParams> {
        let (n, d) = data.dim();
        if n < self.min_samples.max(2) {
            return Err(EngineError::InsufficientData {
                required: self.min_samples.max(2),
                actual: n,
            });
        }
        if d == 0 {
            return Err(EngineError::SchemaMismatch {
                expected: "at least one feature".to_string(),
                actual: "0 features".to_string(),
            });
        }

        let center = data.mean_axis(Axis(0)).ok_or(EngineError::InsufficientData {
            required: self.min_samples,
            actual: 0,
        })?;
        let centered = &data - &center;
        let covariance = centered.t().dot(&centered) / (n - 1) as f64;

        let (eigenvalues, eigenvectors) = symmetric_eigen(covariance, cancel)?;

        let mut order: Vec<usize> = (0..d).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let total: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let mut retained = 0;
        let mut cumulative = 0.0;
        if total > f64::EPSILON {
            for &idx in &order {
                retained += 1;
                cumulative += eigenvalues[idx].max(0.0);
                if cumulative / total >= self.variance_retained {
                    break;
                }
            }
        }

        let components: Vec<Vec<f64>> = order[..retained]
            .iter()
            .map(|&idx| eigenvectors.column(idx).to_vec())
            .collect();

        let mut lower = vec![f64::INFINITY; retained];
        let mut upper = vec![f64::NEG_INFINITY; retained];
        for row in centered.rows() {
            for (j, component) in components.iter().enumerate() {
                let code: f64 = row.iter().zip(component).map(|(a, b)| a * b).sum();
                lower[j] = lower[j].min(code);
                upper[j] = upper[j].max(code);
            }
        }
        for j in 0..retained {
            let sigma = eigenvalues[order[j]].max(0.0).sqrt();
            lower[j] -= self.envelope_margin * sigma;
            upper[j] += self.envelope_margin * sigma;
        }

        let explained_variance = if total > f64::EPSILON { cumulative / total } else { 1.0 };

        log::debug!(
            "PCA envelope: kept {}/{} components ({:.4} of variance) from {} rows",
            retained,
            d,
            explained_variance,
            n
        );

        Ok(ReconstructionParams {
            center: center.to_vec(),
            components,
            lower,
            upper,
            eigenvalues: order.iter().map(|&i| eigenvalues[i]).collect(),
            explained_variance,
        })
    }
}

/// Fitted PCA envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionParams {
    pub center: Vec<f64>,
    /// Retained unit components, one row per component
    pub components: Vec<Vec<f64>>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    /// All eigenvalues, descending
    pub eigenvalues: Vec<f64>,
    pub explained_variance: f64,
}

impl ReconstructionParams {
    pub fn retained_components(&self) -> usize {
        self.components.len()
    }

    pub fn validate(&self) -> EngineResult<()> {
        let d = self.center.len();
        let k = self.components.len();

        if self.components.iter().any(|c| c.len() != d) {
            return Err(EngineError::InvalidSnapshot(
                "reconstruction component width differs from centre".to_string(),
            ));
        }
        if self.lower.len() != k || self.upper.len() != k {
            return Err(EngineError::InvalidSnapshot(
                "reconstruction envelope does not match component count".to_string(),
            ));
        }
        if self.lower.iter().zip(&self.upper).any(|(lo, hi)| !(lo <= hi)) {
            return Err(EngineError::InvalidSnapshot(
                "reconstruction envelope has inverted or NaN bounds".to_string(),
            ));
        }
        Ok(())
    }
}

impl ReconstructionModel for ReconstructionParams {
    fn dimension(&self) -> usize {
        self.center.len()
    }

    fn reconstruct(&self, x: &[f64]) -> EngineResult<Vec<f64>> {
        if x.len() != self.center.len() {
            return Err(EngineError::SchemaMismatch {
                expected: format!("{} features", self.center.len()),
                actual: format!("{} features", x.len()),
            });
        }

        let centered: Vec<f64> = x.iter().zip(&self.center).map(|(a, c)| a - c).collect();
        let mut out = self.center.clone();

        for (j, component) in self.components.iter().enumerate() {
            let code: f64 = centered.iter().zip(component).map(|(a, w)| a * w).sum();
            let code = code.max(self.lower[j]).min(self.upper[j]);
            for (o, w) in out.iter_mut().zip(component) {
                *o += code * w;
            }
        }

        Ok(out)
    }
}

// ============================================================================
// EIGEN DECOMPOSITION
// ============================================================================

/// Cyclic Jacobi eigen decomposition of a symmetric matrix.
///
/// Returns eigenvalues and a matrix whose columns are the matching unit
/// eigenvectors (unsorted).
fn symmetric_eigen(mut a: Array2<f64>, cancel: &CancelToken) -> EngineResult<(Vec<f64>, Array2<f64>)> {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        cancel.check()?;

        let mut off_diagonal = 0.0;
        for p in 0..n {
            for q in 0..n {
                if p != q {
                    off_diagonal += a[[p, q]] * a[[p, q]];
                }
            }
        }
        if off_diagonal < JACOBI_TOLERANCE {
            break;
        }

        for p in 0..n.saturating_sub(1) {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[[i, i]]).collect();
    Ok((eigenvalues, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn gaussian(rows: usize, dims: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        Array2::from_shape_fn((rows, dims), |_| normal.sample(&mut rng))
    }

    fn small_trainer() -> PcaEnvelope {
        PcaEnvelope { min_samples: 100, ..Default::default() }
    }

    /// Reproduces its input exactly: the textbook degenerate model
    struct Identity(usize);

    impl ReconstructionModel for Identity {
        fn dimension(&self) -> usize {
            self.0
        }

        fn reconstruct(&self, x: &[f64]) -> EngineResult<Vec<f64>> {
            Ok(x.to_vec())
        }
    }

    #[test]
    fn test_jacobi_known_matrix() {
        let (mut values, vectors) = symmetric_eigen(array![[2.0, 1.0], [1.0, 2.0]], &CancelToken::new()).unwrap();
        values.sort_by(|a, b| a.total_cmp(b));
        assert!((values[0] - 1.0).abs() < 1e-12);
        assert!((values[1] - 3.0).abs() < 1e-12);

        for col in vectors.columns() {
            let norm: f64 = col.iter().map(|x| x * x).sum();
            assert!((norm - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fit_requires_min_samples() {
        let data = gaussian(50, 5, 1);
        let result = PcaEnvelope::default().fit(data.view(), &CancelToken::new());
        assert!(matches!(
            result,
            Err(EngineError::InsufficientData { required: 1000, actual: 50 })
        ));
    }

    #[test]
    fn test_in_distribution_reconstructs_well() {
        let train = gaussian(2000, 5, 7);
        let params = PcaEnvelope::default().fit(train.view(), &CancelToken::new()).unwrap();
        let held_out = gaussian(1000, 5, 8);

        let below = held_out
            .rows()
            .into_iter()
            .filter(|row| params.score(&row.to_vec()).unwrap() < 0.02)
            .count();
        assert!(below >= 950, "only {} of 1000 held-out rows below threshold", below);
    }

    #[test]
    fn test_far_point_has_large_error() {
        let train = gaussian(2000, 5, 11);
        let params = PcaEnvelope::default().fit(train.view(), &CancelToken::new()).unwrap();

        let far = [0.0, 96.0, 0.0, 0.0, 0.0];
        assert!(params.score(&far).unwrap() > 100.0);
    }

    #[test]
    fn test_degeneracy_guard_catches_identity_model() {
        let identity = Identity(5);
        assert_eq!(degeneracy_probe(&identity, PROBE_MAGNITUDE).unwrap(), 0.0);

        let train = gaussian(2000, 5, 3);
        let params = PcaEnvelope::default().fit(train.view(), &CancelToken::new()).unwrap();
        assert!(degeneracy_probe(&params, PROBE_MAGNITUDE).unwrap() > 1.0);
    }

    #[test]
    fn test_correlated_features_are_compressed() {
        let base = gaussian(500, 2, 21);
        let data = Array2::from_shape_fn((500, 3), |(i, j)| match j {
            0 => base[[i, 0]],
            1 => 2.0 * base[[i, 0]],
            _ => base[[i, 1]],
        });
        let params = small_trainer().fit(data.view(), &CancelToken::new()).unwrap();
        assert_eq!(params.retained_components(), 2);

        // on the learned plane
        assert!(params.score(&[0.5, 1.0, 0.3]).unwrap() < 1e-6);
        // off the plane along the dropped direction
        assert!(params.score(&[1.0, -0.5, 0.0]).unwrap() > 0.3);
    }

    #[test]
    fn test_constant_data_does_not_crash() {
        let data = Array2::<f64>::zeros((200, 5));
        let params = small_trainer().fit(data.view(), &CancelToken::new()).unwrap();
        assert_eq!(params.retained_components(), 0);
        assert!(params.validate().is_ok());
        assert!(params.score(&[1.0, 0.0, 0.0, 0.0, 0.0]).unwrap() > 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let train = gaussian(200, 5, 5);
        let params = small_trainer().fit(train.view(), &CancelToken::new()).unwrap();
        assert!(matches!(params.score(&[0.0; 4]), Err(EngineError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_cancelled_fit_aborts() {
        let token = CancelToken::new();
        token.cancel();
        let train = gaussian(200, 5, 5);
        assert!(matches!(
            small_trainer().fit(train.view(), &token),
            Err(EngineError::TrainingCancelled)
        ));
    }
}
