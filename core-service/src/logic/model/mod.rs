//! Model Module - learned detectors and their snapshot
//!
//! Normalizer, reconstruction model and outlier ensemble are fit together by
//! the training pipeline and shipped as one immutable [`ModelSnapshot`].

pub mod fusion;
pub mod isolation;
pub mod normalizer;
pub mod reconstruction;
pub mod snapshot;

// Re-export common types
pub use fusion::{fuse, AnomalyResult, DetectorKind, FusionThresholds};
pub use isolation::{IsolationForest, IsolationForestTrainer};
pub use normalizer::NormalizerState;
pub use reconstruction::{degeneracy_probe, PcaEnvelope, ReconstructionModel, ReconstructionParams};
pub use snapshot::{ModelSnapshot, SnapshotInfo, TrainingMetrics};
