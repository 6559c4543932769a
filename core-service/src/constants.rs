//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every default can be overridden with an `EHC_*` environment variable.

use std::path::PathBuf;
use std::time::Duration;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Equipment Health Core";

/// Reconstruction error above which a sample is anomalous
pub const DEFAULT_RECON_THRESHOLD: f64 = 0.02;

/// Outlier score below which a sample is anomalous
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = -0.5;

/// Minimum rows needed to fit the reconstruction model
pub const DEFAULT_MIN_TRAINING_SAMPLES: usize = 1000;

/// Rows generated for a synthetic bootstrap
pub const DEFAULT_SYNTHETIC_SAMPLES: usize = 10_000;

/// Seed for shuffling, tree sampling and synthetic data
pub const DEFAULT_TRAINING_SEED: u64 = 42;

/// Baseline remaining life (30 days)
pub const DEFAULT_BASE_LIFE_HOURS: f64 = 720.0;

/// Absence policy for anomaly detection: "impute" or "reject"
pub const DEFAULT_ABSENCE_POLICY: &str = "impute";

// Environment variable names
pub const ENV_RECON_THRESHOLD: &str = "EHC_RECON_THRESHOLD";
pub const ENV_OUTLIER_THRESHOLD: &str = "EHC_OUTLIER_THRESHOLD";
pub const ENV_MIN_TRAINING_SAMPLES: &str = "EHC_MIN_TRAINING_SAMPLES";
pub const ENV_SYNTHETIC_SAMPLES: &str = "EHC_SYNTHETIC_SAMPLES";
pub const ENV_TRAINING_SEED: &str = "EHC_TRAINING_SEED";
pub const ENV_TRAINING_TIMEOUT_SECS: &str = "EHC_TRAINING_TIMEOUT_SECS";
pub const ENV_BASE_LIFE_HOURS: &str = "EHC_BASE_LIFE_HOURS";
pub const ENV_ABSENCE_POLICY: &str = "EHC_ABSENCE_POLICY";
pub const ENV_SNAPSHOT_PATH: &str = "EHC_SNAPSHOT_PATH";

// ============================================
// Helper functions to read from env with fallback
// ============================================

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Get reconstruction threshold from environment or use default
pub fn get_recon_threshold() -> f64 {
    env_parse(ENV_RECON_THRESHOLD).unwrap_or(DEFAULT_RECON_THRESHOLD)
}

/// Get outlier threshold from environment or use default
pub fn get_outlier_threshold() -> f64 {
    env_parse(ENV_OUTLIER_THRESHOLD).unwrap_or(DEFAULT_OUTLIER_THRESHOLD)
}

pub fn get_min_training_samples() -> usize {
    env_parse(ENV_MIN_TRAINING_SAMPLES).unwrap_or(DEFAULT_MIN_TRAINING_SAMPLES)
}

pub fn get_synthetic_samples() -> usize {
    env_parse(ENV_SYNTHETIC_SAMPLES).unwrap_or(DEFAULT_SYNTHETIC_SAMPLES)
}

pub fn get_training_seed() -> u64 {
    env_parse(ENV_TRAINING_SEED).unwrap_or(DEFAULT_TRAINING_SEED)
}

/// Training deadline; unset or 0 = no deadline
pub fn get_training_timeout() -> Option<Duration> {
    env_parse::<u64>(ENV_TRAINING_TIMEOUT_SECS)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

pub fn get_base_life_hours() -> f64 {
    env_parse(ENV_BASE_LIFE_HOURS).unwrap_or(DEFAULT_BASE_LIFE_HOURS)
}

/// Raw absence policy name, lowercased
pub fn get_absence_policy() -> String {
    std::env::var(ENV_ABSENCE_POLICY)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|_| DEFAULT_ABSENCE_POLICY.to_string())
}

/// Snapshot file override; `None` = platform data dir
pub fn get_snapshot_path() -> Option<PathBuf> {
    std::env::var(ENV_SNAPSHOT_PATH)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
