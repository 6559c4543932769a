//! Model Registry - active snapshot holder
//!
//! Readers load the active `Arc<ModelSnapshot>` without locking. Writers are
//! serialized by a try-lock: a second concurrent writer gets `WriterBusy`
//! instead of queueing. Install order is validate -> persist -> swap, so a
//! failed install leaves the previous snapshot active.

pub mod storage;


use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

pub use storage::{get_default_snapshot_path, JsonFileStore, MemoryStore, SnapshotStore};

use crate::logic::error::{EngineError, EngineResult};
use crate::logic::features::LayoutInfo;
use crate::logic::model::{ModelSnapshot, SnapshotInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub store: String,
    /// Layout this build encodes samples with
    pub layout: LayoutInfo,
    pub active: Option<SnapshotInfo>,
}

pub struct ModelRegistry {
    active: ArcSwapOption<ModelSnapshot>,
    writer: Mutex<()>,
    store: Box<dyn SnapshotStore>,
}

impl ModelRegistry {
    /// Empty registry; nothing is loaded from `store`
    pub fn new(store: Box<dyn SnapshotStore>) -> Self {
        Self {
            active: ArcSwapOption::empty(),
            writer: Mutex::new(()),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Registry primed with whatever `store` has persisted.
    ///
    /// A persisted snapshot that is corrupt or was written under another
    /// layout is quarantined and the registry starts empty, so the caller
    /// retrains. I/O failures still propagate.
    pub fn bootstrap(store: Box<dyn SnapshotStore>) -> EngineResult<Self> {
        let registry = Self::new(store);

        let loaded = registry.store.load().and_then(|snapshot| {
            if let Some(s) = &snapshot {
                s.validate()?;
            }
            Ok(snapshot)
        });

        match loaded {
            Ok(Some(snapshot)) => {
                log::info!(
                    "Loaded snapshot v{} ({} samples, synthetic={}) from {}",
                    snapshot.version,
                    snapshot.training_sample_count,
                    snapshot.synthetic,
                    registry.store.describe()
                );
                registry.active.store(Some(Arc::new(snapshot)));
            }
            Ok(None) => log::info!("No persisted snapshot in {}", registry.store.describe()),
            Err(e) if e.is_unusable_snapshot() => {
                log::warn!(
                    "Discarding unusable snapshot in {}: {}",
                    registry.store.describe(),
                    e
                );
                registry.store.quarantine()?;
            }
            Err(e) => return Err(e),
        }

        Ok(registry)
    }

    /// Active snapshot; never blocks
    pub fn current(&self) -> EngineResult<Arc<ModelSnapshot>> {
        self.active.load_full().ok_or(EngineError::NoModelLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.active.load().is_some()
    }

    /// Version of the active snapshot, 0 if none
    pub fn active_version(&self) -> u64 {
        self.active.load_full().map_or(0, |s| s.version)
    }

    /// Take the writer slot; fails fast if another writer holds it
    pub fn begin_write(&self) -> EngineResult<WriteLease<'_>> {
        let guard = self.writer.try_lock().ok_or(EngineError::WriterBusy)?;
        Ok(WriteLease {
            registry: self,
            _guard: guard,
        })
    }

    /// One-shot install under a fresh lease
    pub fn install(&self, snapshot: ModelSnapshot) -> EngineResult<Arc<ModelSnapshot>> {
        self.begin_write()?.install(snapshot)
    }

    fn install_locked(&self, snapshot: ModelSnapshot) -> EngineResult<Arc<ModelSnapshot>> {
        snapshot.validate()?;

        let active = self.active_version();
        if snapshot.version <= active {
            return Err(EngineError::StaleSnapshot {
                offered: snapshot.version,
                active,
            });
        }

        self.store.save(&snapshot)?;

        let snapshot = Arc::new(snapshot);
        self.active.store(Some(Arc::clone(&snapshot)));

        log::info!(
            "Installed snapshot v{} (id {}, accuracy {:.3}, synthetic={})",
            snapshot.version,
            snapshot.id,
            snapshot.accuracy,
            snapshot.synthetic
        );
        Ok(snapshot)
    }

    pub fn info(&self) -> RegistryInfo {
        RegistryInfo {
            store: self.store.describe(),
            layout: LayoutInfo::current(),
            active: self.active.load_full().map(|s| s.info()),
        }
    }
}

/// Exclusive writer slot. Dropping it without installing releases the slot
/// and leaves the active snapshot untouched.
pub struct WriteLease<'a> {
    registry: &'a ModelRegistry,
    _guard: MutexGuard<'a, ()>,
}

impl WriteLease<'_> {
    pub fn active_version(&self) -> u64 {
        self.registry.active_version()
    }

    pub fn install(self, snapshot: ModelSnapshot) -> EngineResult<Arc<ModelSnapshot>> {
        self.registry.install_locked(snapshot)
    }
}
