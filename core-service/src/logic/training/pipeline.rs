//! Training Pipeline
//!
//! validate/encode -> shuffle + hold-out -> normalizer -> reconstruction
//! model -> degeneracy guard -> outlier ensemble -> hold-out metrics ->
//! snapshot.
//!
//! Hold-out rows are the negatives. Positives are injected: copies of
//! hold-out rows with one feature pushed `PROBE_MAGNITUDE` standard
//! deviations out, drawn from a seeded RNG so metrics are reproducible.
//!
//! `fit` has no side effects. `run` holds the registry's writer slot for the
//! whole fit and installs only a complete snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cancel::CancelToken;
use super::synthetic;
use crate::constants::{DEFAULT_MIN_TRAINING_SAMPLES, DEFAULT_SYNTHETIC_SAMPLES, DEFAULT_TRAINING_SEED};
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::layout::{layout_hash, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
use crate::logic::features::FeatureVector;
use crate::logic::model::reconstruction::{degeneracy_probe, ReconstructionModel, PROBE_MAGNITUDE};
use crate::logic::model::{
    fuse, FusionThresholds, IsolationForestTrainer, ModelSnapshot, NormalizerState, PcaEnvelope,
    TrainingMetrics,
};
use crate::logic::registry::ModelRegistry;
use crate::logic::telemetry::TelemetrySample;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub min_samples: usize,
    pub synthetic_samples: usize,
    pub seed: u64,
    /// Fraction of rows held out for accuracy
    pub validation_fraction: f64,
    /// Injected anomalies per hold-out row (0 disables precision/recall)
    pub holdout_anomaly_fraction: f64,
    pub variance_retained: f64,
    pub envelope_margin: f64,
    pub n_trees: usize,
    pub tree_sample_size: usize,
    /// Reported when there is not enough data to hold any rows out
    pub fallback_accuracy: f64,
    pub timeout: Option<Duration>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: DEFAULT_MIN_TRAINING_SAMPLES,
            synthetic_samples: DEFAULT_SYNTHETIC_SAMPLES,
            seed: DEFAULT_TRAINING_SEED,
            validation_fraction: 0.2,
            holdout_anomaly_fraction: 0.1,
            variance_retained: 0.999,
            envelope_margin: 0.5,
            n_trees: 100,
            tree_sample_size: 256,
            fallback_accuracy: 0.924,
            timeout: None,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let check = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(EngineError::InvalidConfig(msg.to_string()))
            }
        };

        check(self.min_samples >= 2, "min_samples must be >= 2")?;
        check(
            (0.0..1.0).contains(&self.validation_fraction),
            "validation_fraction must be in [0, 1)",
        )?;
        check(
            (0.0..=1.0).contains(&self.holdout_anomaly_fraction),
            "holdout_anomaly_fraction must be in [0, 1]",
        )?;
        check(
            self.variance_retained > 0.0 && self.variance_retained <= 1.0,
            "variance_retained must be in (0, 1]",
        )?;
        check(self.envelope_margin >= 0.0, "envelope_margin must be >= 0")?;
        check(self.n_trees > 0, "n_trees must be > 0")?;
        check(self.tree_sample_size >= 2, "tree_sample_size must be >= 2")?;
        check(
            (0.0..=1.0).contains(&self.fallback_accuracy),
            "fallback_accuracy must be in [0, 1]",
        )
    }

    /// Token honouring `timeout`, if one is set
    pub fn cancel_token(&self) -> CancelToken {
        match self.timeout {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        }
    }
}

/// Where training rows come from
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingSource {
    Historical(Vec<TelemetrySample>),
    Synthetic { samples: usize, seed: u64 },
}

impl TrainingSource {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, TrainingSource::Synthetic { .. })
    }
}

pub struct TrainingPipeline {
    config: TrainingConfig,
    thresholds: FusionThresholds,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig, thresholds: FusionThresholds) -> Self {
        Self { config, thresholds }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Synthetic source using the configured size and seed
    pub fn synthetic_source(&self) -> TrainingSource {
        TrainingSource::Synthetic {
            samples: self.config.synthetic_samples,
            seed: self.config.seed,
        }
    }

    /// Fit, then install under the registry's writer slot.
    ///
    /// The slot is taken before fitting, so a concurrent run fails fast with
    /// `WriterBusy`. Any failure leaves the active snapshot in place.
    pub fn run(
        &self,
        registry: &ModelRegistry,
        source: TrainingSource,
        cancel: &CancelToken,
    ) -> EngineResult<Arc<ModelSnapshot>> {
        let lease = registry.begin_write()?;
        let version = lease.active_version() + 1;

        let snapshot = self.fit(source, version, cancel)?;
        cancel.check()?;
        lease.install(snapshot)
    }

    /// Build a snapshot with the given version without touching any registry
    pub fn fit(&self, source: TrainingSource, version: u64, cancel: &CancelToken) -> EngineResult<ModelSnapshot> {
        let cfg = &self.config;
        let synthetic = source.is_synthetic();

        // 1. Rows
        let (vectors, skipped_rows) = match source {
            TrainingSource::Historical(samples) => {
                log::info!("Training on {} historical samples", samples.len());
                encode_valid(&samples)
            }
            TrainingSource::Synthetic { samples, seed } => {
                log::info!("Training on {} SYNTHETIC samples (seed {})", samples, seed);
                let generated = synthetic::generate(samples, seed, Utc::now())?;
                encode_valid(&generated)
            }
        };

        if vectors.len() < cfg.min_samples {
            return Err(EngineError::InsufficientData {
                required: cfg.min_samples,
                actual: vectors.len(),
            });
        }

        // 2. Shuffle + hold-out
        let mut vectors = vectors;
        vectors.shuffle(&mut StdRng::seed_from_u64(cfg.seed));

        let mut holdout_count = (vectors.len() as f64 * cfg.validation_fraction).floor() as usize;
        if vectors.len() - holdout_count < cfg.min_samples {
            holdout_count = 0;
        }
        let (holdout, train) = vectors.split_at(holdout_count);

        // 3. Normalizer
        cancel.check()?;
        let normalizer = NormalizerState::fit(train)?;
        let matrix = normalizer.transform_all(train)?;

        // 4. Reconstruction model + degeneracy guard
        cancel.check()?;
        let envelope = PcaEnvelope {
            min_samples: cfg.min_samples,
            variance_retained: cfg.variance_retained,
            envelope_margin: cfg.envelope_margin,
        };
        let reconstruction = envelope.fit(matrix.view(), cancel)?;

        let probe_error = degeneracy_probe(&reconstruction, PROBE_MAGNITUDE)?;
        if probe_error <= self.thresholds.reconstruction {
            return Err(EngineError::DegenerateModel {
                probe_error,
                threshold: self.thresholds.reconstruction,
            });
        }

        // 5. Outlier ensemble
        cancel.check()?;
        let outlier = IsolationForestTrainer {
            n_trees: cfg.n_trees,
            sample_size: cfg.tree_sample_size,
            seed: cfg.seed,
        }
        .fit(matrix.view(), cancel)?;

        // 6. Hold-out metrics
        cancel.check()?;
        let mut metrics = TrainingMetrics {
            holdout_count,
            retained_components: reconstruction.retained_components(),
            explained_variance: reconstruction.explained_variance,
            skipped_rows,
            ..Default::default()
        };

        let accuracy = if holdout.is_empty() {
            log::info!(
                "Not enough rows for a hold-out; reporting fallback accuracy {}",
                cfg.fallback_accuracy
            );
            cfg.fallback_accuracy
        } else {
            let flag = |x: &[f64]| -> EngineResult<(f64, bool)> {
                let error = reconstruction.score(x)?;
                let score = outlier.score(x)?;
                Ok((error, fuse(error, score, 1.0, &self.thresholds).is_anomaly))
            };

            let mut confusion = Confusion::default();
            let mut errors = Vec::with_capacity(holdout.len());
            let mut rows = Vec::with_capacity(holdout.len());
            for vector in holdout {
                let x = normalizer.transform(vector)?;
                let (error, flagged) = flag(&x[..])?;
                confusion.record(false, flagged);
                errors.push(error);
                rows.push(x);
            }

            let injected = (holdout.len() as f64 * cfg.holdout_anomaly_fraction).round() as usize;
            let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(1));
            for _ in 0..injected {
                let mut x = rows[rng.gen_range(0..rows.len())];
                let feature = rng.gen_range(0..FEATURE_COUNT);
                let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                x[feature] += sign * PROBE_MAGNITUDE;
                let (_, flagged) = flag(&x[..])?;
                confusion.record(true, flagged);
            }

            errors.sort_by(|a, b| a.total_cmp(b));
            metrics.holdout_p95_error = Some(errors[((errors.len() - 1) as f64 * 0.95).round() as usize]);
            metrics.injected_anomalies = injected;
            if injected > 0 {
                metrics.precision = Some(confusion.precision());
                metrics.recall = Some(confusion.recall());
                metrics.f1_score = Some(confusion.f1_score());
            }
            confusion.accuracy()
        };

        let snapshot = ModelSnapshot {
            id: Uuid::new_v4(),
            version,
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            feature_order: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            metrics,
            normalizer,
            reconstruction,
            outlier,
            trained_at: Utc::now(),
            training_sample_count: train.len(),
            synthetic,
            accuracy,
        };
        snapshot.validate()?;

        log::info!(
            "Trained snapshot v{}: {} rows, {} held out (+{} injected), accuracy {:.3}, recall {:?}, {} components, probe error {:.2}",
            snapshot.version,
            snapshot.training_sample_count,
            holdout_count,
            snapshot.metrics.injected_anomalies,
            accuracy,
            snapshot.metrics.recall,
            snapshot.metrics.retained_components,
            probe_error
        );

        Ok(snapshot)
    }
}

/// Hold-out confusion counts; injected rows are the positives
#[derive(Debug, Default, Clone, Copy)]
struct Confusion {
    true_positive: usize,
    false_positive: usize,
    true_negative: usize,
    false_negative: usize,
}

impl Confusion {
    fn record(&mut self, injected: bool, flagged: bool) {
        match (injected, flagged) {
            (true, true) => self.true_positive += 1,
            (true, false) => self.false_negative += 1,
            (false, true) => self.false_positive += 1,
            (false, false) => self.true_negative += 1,
        }
    }

    fn accuracy(&self) -> f64 {
        let total = self.true_positive + self.false_positive + self.true_negative + self.false_negative;
        ratio(self.true_positive + self.true_negative, total)
    }

    fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    fn f1_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Encode valid samples; invalid ones are skipped and counted
fn encode_valid(samples: &[TelemetrySample]) -> (Vec<FeatureVector>, usize) {
    let mut vectors = Vec::with_capacity(samples.len());
    let mut skipped = 0;

    for sample in samples {
        match sample.validate() {
            Ok(()) => vectors.push(sample.encode()),
            Err(e) => {
                skipped += 1;
                log::warn!("Skipping training row from {}: {}", sample.device_id, e);
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} of {} training rows", skipped, samples.len());
    }
    (vectors, skipped)
}
