//! Snapshot stores
//!
//! The registry persists through [`SnapshotStore`] before it swaps, so a
//! snapshot that could not be saved never becomes active.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::logic::error::{EngineError, EngineResult};
use crate::logic::model::ModelSnapshot;

pub const APP_DIR: &str = "equipment-health";
pub const SNAPSHOT_FILE: &str = "model_snapshot.json";

pub trait SnapshotStore: Send + Sync {
    /// Last saved snapshot, if any
    fn load(&self) -> EngineResult<Option<ModelSnapshot>>;

    fn save(&self, snapshot: &ModelSnapshot) -> EngineResult<()>;

    /// Move an unusable persisted snapshot out of the way
    fn quarantine(&self) -> EngineResult<()>;

    /// Short description for logs
    fn describe(&self) -> String;
}

// ============================================================================
// MEMORY
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<ModelSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: ModelSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> EngineResult<Option<ModelSnapshot>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, snapshot: &ModelSnapshot) -> EngineResult<()> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn quarantine(&self) -> EngineResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// JSON FILE
// ============================================================================

/// Default snapshot path under the platform data dir
pub fn get_default_snapshot_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(SNAPSHOT_FILE)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Pretty JSON file plus a `.sha256` sidecar of its bytes.
///
/// The sidecar is replaced before the snapshot, so an interrupted save
/// leaves a pair that fails the checksum and gets quarantined on load.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_location() -> Self {
        Self::new(get_default_snapshot_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn checksum_path(&self) -> PathBuf {
        Self::sibling(&self.path, ".sha256")
    }

    fn sibling(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> EngineResult<()> {
        let tmp = Self::sibling(path, ".tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> EngineResult<Option<ModelSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read(&self.path)?;
        let checksum_path = self.checksum_path();
        if !checksum_path.exists() {
            return Err(EngineError::InvalidSnapshot(format!(
                "checksum file {} is missing",
                checksum_path.display()
            )));
        }
        let expected = fs::read_to_string(&checksum_path)?;
        let actual = sha256_hex(&data);
        if expected.trim() != actual {
            return Err(EngineError::InvalidSnapshot(format!(
                "checksum mismatch for {}",
                self.path.display()
            )));
        }

        let snapshot: ModelSnapshot = serde_json::from_slice(&data)?;

        // Validate version/layout
        snapshot.validate()?;

        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &ModelSnapshot) -> EngineResult<()> {
        // Ensure directory exists
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(snapshot)?;
        let staged = Self::sibling(&self.path, ".tmp");
        fs::write(&staged, &json)?;
        Self::write_atomic(&self.checksum_path(), sha256_hex(&json).as_bytes())?;
        fs::rename(&staged, &self.path)?;

        log::info!(
            "Saved snapshot v{} to {}",
            snapshot.version,
            self.path.display()
        );
        Ok(())
    }

    fn quarantine(&self) -> EngineResult<()> {
        let suffix = format!(".corrupt-{}", Utc::now().format("%Y%m%d%H%M%S"));

        for path in [self.path.clone(), self.checksum_path()] {
            if path.exists() {
                let target = Self::sibling(&path, &suffix);
                fs::rename(&path, &target)?;
                log::warn!("Moved {} to {}", path.display(), target.display());
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
