//! Feature Vector - Core data structure for model input
//!
//! **Versioned feature vector with layout validation**
//!
//! Alongside the values it carries a presence mask: an absent reading is
//! stored as `0.0` but never mistaken for a measured zero.

use serde::{Deserialize, Serialize};

use super::layout::{
    feature_index, layout_hash, validate_layout, Feature, FEATURE_COUNT, FEATURE_LAYOUT,
    FEATURE_VERSION,
};
use crate::logic::error::EngineResult;

// ============================================================================
// VERSIONED FEATURE VECTOR
// ============================================================================

/// Versioned Feature Vector with layout metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature layout version
    pub version: u8,
    /// CRC32 hash of the feature layout (for mismatch detection)
    pub layout_hash: u32,
    /// Feature values in order defined by FEATURE_LAYOUT
    pub values: [f64; FEATURE_COUNT],
    /// Which slots hold a real reading
    pub present: [bool; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create an empty vector (every feature absent) with current version
    pub fn new() -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values: [0.0; FEATURE_COUNT],
            present: [false; FEATURE_COUNT],
        }
    }

    /// Create from raw values, all marked present
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
            present: [true; FEATURE_COUNT],
        }
    }

    /// Get a present feature by index
    pub fn get(&self, index: usize) -> Option<f64> {
        match self.present.get(index) {
            Some(true) => self.values.get(index).copied(),
            _ => None,
        }
    }

    pub fn feature(&self, feature: Feature) -> Option<f64> {
        self.get(feature.index())
    }

    /// Get a present feature by name
    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        feature_index(name).and_then(|i| self.get(i))
    }

    /// Set feature by index and mark it present
    pub fn set(&mut self, index: usize, value: f64) {
        if index < FEATURE_COUNT {
            self.values[index] = value;
            self.present[index] = true;
        }
    }

    pub fn is_present(&self, feature: Feature) -> bool {
        self.present[feature.index()]
    }

    pub fn is_complete(&self) -> bool {
        self.present.iter().all(|p| *p)
    }

    /// Names of absent features, in layout order
    pub fn missing(&self) -> Vec<&'static str> {
        FEATURE_LAYOUT
            .iter()
            .zip(self.present.iter())
            .filter(|(_, present)| !**present)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Validate that this vector is compatible with current layout
    pub fn validate(&self) -> EngineResult<()> {
        validate_layout(self.version, self.layout_hash)
    }

    pub fn is_compatible(&self) -> bool {
        self.validate().is_ok()
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_version": self.version,
            "layout_hash": self.layout_hash,
            "named_values": FEATURE_LAYOUT.iter()
                .enumerate()
                .map(|(i, name)| (name.to_string(), self.get(i)))
                .collect::<std::collections::BTreeMap<_, _>>(),
        })
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vector_is_empty() {
        let v = FeatureVector::new();
        assert!(v.is_compatible());
        assert_eq!(v.missing().len(), FEATURE_COUNT);
        assert_eq!(v.get(0), None);
    }

    #[test]
    fn test_set_marks_present() {
        let mut v = FeatureVector::new();
        v.set(Feature::Vibration.index(), 0.0);
        assert_eq!(v.feature(Feature::Vibration), Some(0.0));
        assert!(v.is_present(Feature::Vibration));
        assert!(!v.missing().contains(&"vibration"));

        // out of range writes are ignored
        v.set(FEATURE_COUNT + 3, 1.0);
        assert!(!v.is_complete());
    }

    #[test]
    fn test_from_values_complete() {
        let v = FeatureVector::from_values([70.0, 0.02, 1500.0, 100.0, 2.4]);
        assert!(v.is_complete());
        assert_eq!(v.get_by_name("rpm"), Some(1500.0));
    }

    #[test]
    fn test_foreign_layout_rejected() {
        let mut v = FeatureVector::from_values([0.0; FEATURE_COUNT]);
        v.layout_hash = !v.layout_hash;
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_log_entry_marks_absent_as_null() {
        let mut v = FeatureVector::new();
        v.set(0, 71.5);
        let entry = v.to_log_entry();
        assert_eq!(entry["named_values"]["temperature"], 71.5);
        assert!(entry["named_values"]["rpm"].is_null());
    }
}
