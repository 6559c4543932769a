//! Training Module - builds model snapshots
//!
//! Offline path: rows (historical or synthetic) in, validated
//! [`ModelSnapshot`](crate::logic::model::ModelSnapshot) out, installed
//! through the registry.

pub mod cancel;
pub mod pipeline;
pub mod synthetic;

#[cfg(test)]
mod tests;

// Re-export common types
pub use cancel::CancelToken;
pub use pipeline::{TrainingConfig, TrainingPipeline, TrainingSource};
