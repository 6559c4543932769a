//! Features Module - Feature Encoding
//!
//! Fixed-order encoding of telemetry readings.
//! `layout` is the single source of truth for order and versioning.

pub mod layout;
pub mod vector;

// Re-export common types
pub use layout::{Feature, LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use vector::FeatureVector;
