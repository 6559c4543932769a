//! Equipment Health Core
//!
//! Turns industrial equipment telemetry into an anomaly decision, a 0-100
//! health score and a remaining-life estimate with a maintenance window.

pub mod constants;
pub mod logic;

pub use logic::analysis::{AnalysisKind, AnalysisOutcome, Analyzer, FullReport};
pub use logic::config::{AbsencePolicy, EngineConfig};
pub use logic::error::{EngineError, EngineResult};
pub use logic::health::HealthScore;
pub use logic::model::{AnomalyResult, ModelSnapshot};
pub use logic::prediction::FailurePrediction;
pub use logic::registry::{JsonFileStore, MemoryStore, ModelRegistry, SnapshotStore};
pub use logic::telemetry::TelemetrySample;
pub use logic::training::{CancelToken, TrainingPipeline, TrainingSource};
