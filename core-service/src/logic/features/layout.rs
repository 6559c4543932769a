//! Feature Layout - Centralized Feature Definition
//!
//! **CRITICAL: This file controls the feature schema**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! A model snapshot records the version and hash it was trained under and
//! refuses vectors encoded under any other layout.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
/// MUST be incremented when layout changes
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    "temperature",       // 0: Housing temperature (°C)
    "vibration",         // 1: Vibration amplitude (0-1 scale)
    "rpm",               // 2: Rotational speed
    "pressure",          // 3: Line pressure
    "power_consumption", // 4: Power draw (kW)
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 5;

/// Typed handle for a slot in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Temperature,
    Vibration,
    Rpm,
    Pressure,
    PowerConsumption,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Temperature,
        Feature::Vibration,
        Feature::Rpm,
        Feature::Pressure,
        Feature::PowerConsumption,
    ];

    pub fn index(self) -> usize {
        match self {
            Feature::Temperature => 0,
            Feature::Vibration => 1,
            Feature::Rpm => 2,
            Feature::Pressure => 3,
            Feature::PowerConsumption => 4,
        }
    }

    pub fn name(self) -> &'static str {
        FEATURE_LAYOUT[self.index()]
    }
}

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// Hash an arbitrary version + ordered name list the same way the current
/// layout is hashed, so persisted feature orders can be re-checked.
pub fn layout_hash_of<S: AsRef<str>>(version: u8, names: &[S]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[version]);

    for name in names {
        hasher.update(name.as_ref().as_bytes());
        hasher.update(&[0]); // Separator
    }

    hasher.finalize()
}

/// CRC32 hash of the current feature layout
pub fn layout_hash() -> u32 {
    layout_hash_of(FEATURE_VERSION, FEATURE_LAYOUT)
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

fn describe(version: u8, hash: u32) -> String {
    format!("layout v{} (hash {:08x})", version, hash)
}

/// Validate that incoming data matches current layout
pub fn validate_layout(incoming_version: u8, incoming_hash: u32) -> EngineResult<()> {
    let current_hash = layout_hash();

    if incoming_version != FEATURE_VERSION || incoming_hash != current_hash {
        return Err(EngineError::SchemaMismatch {
            expected: describe(FEATURE_VERSION, current_hash),
            actual: describe(incoming_version, incoming_hash),
        });
    }

    Ok(())
}

/// Validate a persisted feature order (names + claimed version/hash)
pub fn validate_feature_order(version: u8, hash: u32, names: &[String]) -> EngineResult<()> {
    validate_layout(version, hash)?;

    if names.len() != FEATURE_COUNT || layout_hash_of(version, names) != hash {
        return Err(EngineError::SchemaMismatch {
            expected: FEATURE_LAYOUT.join(","),
            actual: names.join(","),
        });
    }

    Ok(())
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

/// Get feature index by name
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

// ============================================================================
// TESTS
// ============================================================================
