//! Error taxonomy
//!
//! Every fallible operation in the engine returns [`EngineResult`].
//! Recoverable conditions (not enough data, no model yet, writer busy) are
//! separate variants so callers can schedule a retry instead of giving up.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // Data errors
    #[error("insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    #[error("invalid telemetry sample: {0}")]
    InvalidSample(String),

    #[error("required feature '{0}' is missing")]
    MissingFeature(&'static str),

    // Model availability
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("no model snapshot loaded")]
    NoModelLoaded,

    // Training / install
    #[error("another training run or install is in progress")]
    WriterBusy,

    #[error("snapshot v{offered} is not newer than active v{active}")]
    StaleSnapshot { offered: u64, active: u64 },

    #[error("reconstruction model is degenerate: probe error {probe_error:.6} does not exceed {threshold}")]
    DegenerateModel { probe_error: f64, threshold: f64 },

    #[error("training cancelled")]
    TrainingCancelled,

    #[error("training exceeded its deadline")]
    TrainingTimedOut,

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Storage
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// True for conditions that resolve by waiting, training or retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. }
                | EngineError::ModelUnavailable(_)
                | EngineError::NoModelLoaded
                | EngineError::WriterBusy
                | EngineError::TrainingCancelled
                | EngineError::TrainingTimedOut
        )
    }

    /// True when a persisted snapshot is unreadable or belongs to another
    /// layout; retraining replaces it.
    pub fn is_unusable_snapshot(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidSnapshot(_)
                | EngineError::SchemaMismatch { .. }
                | EngineError::Serialization(_)
        )
    }
}
