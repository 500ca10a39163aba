//! Persistence hook for per-player records.
//!
//! The engine only needs two operations: read everything at startup, and
//! save records as players leave and at shutdown. [`JsonFileStore`] keeps
//! the records as a JSON array on disk; [`MemoryStore`] keeps them in
//! memory for tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arena_core::{PersistedRecord, PlayerId};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::StoreError;

/// Backing storage for [`PersistedRecord`]s.
pub trait PlayerStore: Send {
    /// Read every stored record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be read.
    fn load_all(&mut self) -> Result<Vec<PersistedRecord>, StoreError>;

    /// Persist a batch of records, replacing any stored under the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be written.
    fn save(&mut self, records: &[PersistedRecord]) -> Result<(), StoreError>;
}

/// Records stored as a JSON array in a single file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: BTreeMap<PlayerId, PersistedRecord>,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let records: Vec<&PersistedRecord> = self.records.values().collect();
        let text = serde_json::to_string_pretty(&records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), records = records.len(), "store written");
        Ok(())
    }
}

impl PlayerStore for JsonFileStore {
    fn load_all(&mut self) -> Result<Vec<PersistedRecord>, StoreError> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no store file yet");
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let records: Vec<PersistedRecord> = serde_json::from_str(&text)?;
        self.records = records.iter().map(|r| (r.id, r.clone())).collect();
        info!(path = %self.path.display(), records = records.len(), "store loaded");
        Ok(records)
    }

    fn save(&mut self, records: &[PersistedRecord]) -> Result<(), StoreError> {
        for record in records {
            self.records.insert(record.id, record.clone());
        }
        self.write()
    }
}

/// In-memory store. Clones share the same records, so a test can keep a
/// handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<PlayerId, PersistedRecord>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with records.
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = PersistedRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.records.insert(record.id, record);
        }
        store
    }

    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<PersistedRecord> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of `save` calls so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl PlayerStore for MemoryStore {
    fn load_all(&mut self) -> Result<Vec<PersistedRecord>, StoreError> {
        let mut records: Vec<PersistedRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn save(&mut self, records: &[PersistedRecord]) -> Result<(), StoreError> {
        for record in records {
            self.records.insert(record.id, record.clone());
        }
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
