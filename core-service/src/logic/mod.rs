//! Logic Module - Engine
//!
//! - `features/` - fixed feature layout and encoded vectors
//! - `model/` - normalizer, reconstruction model, outlier ensemble, fusion, snapshot
//! - `training/` - snapshot training pipeline
//! - `registry/` - active snapshot holder and snapshot stores
//! - `analysis/` - per-sample entry point

pub mod config;
pub mod error;
pub mod health;
pub mod prediction;
pub mod simulator;
pub mod telemetry;

pub mod analysis;
pub mod features;
pub mod model;
pub mod registry;
pub mod training;
