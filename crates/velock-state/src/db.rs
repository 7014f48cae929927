use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;
use velock_core::error::VeError;

use crate::kv::{KvRead, KvStore};

/// Persistent ledger database backed by sled (pure-Rust, no C dependencies).
///
/// All ledger keys live in the single `ve` tree (layout in `keys`), so one
/// `sled::Batch` commits a whole state transition atomically.
pub struct StateDb {
    _db: sled::Db,
    ve: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VeError> {
        let db = sled::open(path).map_err(|e| VeError::Storage(e.to_string()))?;
        let ve = db.open_tree("ve").map_err(|e| VeError::Storage(e.to_string()))?;
        Ok(Self { _db: db, ve })
    }

    /// Start staging the writes of one state transition.
    pub fn stage(&self) -> StagedStore<'_> {
        StagedStore {
            base: self,
            pending: BTreeMap::new(),
        }
    }

    /// Whether nothing has ever been committed.
    pub fn is_fresh(&self) -> bool {
        self.ve.is_empty()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), VeError> {
        self._db.flush().map_err(|e| VeError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl KvRead for StateDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VeError> {
        self.ve
            .get(key)
            .map(|v| v.map(|iv| iv.to_vec()))
            .map_err(|e| VeError::Storage(e.to_string()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        let mut entries = Vec::new();
        for item in self.ve.scan_prefix(prefix) {
            let (key, value) = item.map_err(|e| VeError::Storage(e.to_string()))?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        let mut entries = Vec::new();
        if start >= end {
            return Ok(entries);
        }
        for item in self.ve.range(start..end) {
            let (key, value) = item.map_err(|e| VeError::Storage(e.to_string()))?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}

// ── Staged writes ────────────────────────────────────────────────────────────

/// Pending writes of one state transition layered over the committed state.
///
/// Reads see pending writes first. Nothing reaches the database until
/// `commit`; dropping the stage discards every write.
pub struct StagedStore<'a> {
    base: &'a StateDb,
    /// `None` marks a pending delete.
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl StagedStore<'_> {
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply every pending write in one atomic batch.
    pub fn commit(self) -> Result<(), VeError> {
        let writes = self.pending.len();
        let mut batch = sled::Batch::default();
        for (key, value) in self.pending {
            match value {
                Some(v) => batch.insert(key, v),
                None => batch.remove(key),
            }
        }
        self.base
            .ve
            .apply_batch(batch)
            .map_err(|e| VeError::Storage(e.to_string()))?;
        debug!(writes, "committed staged writes");
        Ok(())
    }
}

impl KvRead for StagedStore<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, VeError> {
        match self.pending.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.base.get(key),
        }
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        let committed = self.base.scan_prefix(prefix)?;
        let staged = self
            .pending
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix));
        Ok(overlay(committed, staged))
    }

    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, VeError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let committed = self.base.scan_range(start, end)?;
        let staged = self.pending.range(start.to_vec()..end.to_vec());
        Ok(overlay(committed, staged))
    }
}

/// Committed entries with pending writes and deletes applied on top.
fn overlay<'p>(
    committed: Vec<(Vec<u8>, Vec<u8>)>,
    staged: impl Iterator<Item = (&'p Vec<u8>, &'p Option<Vec<u8>>)>,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = committed.into_iter().collect();
    for (key, value) in staged {
        match value {
            Some(v) => {
                merged.insert(key.clone(), v.clone());
            }
            None => {
                merged.remove(key);
            }
        }
    }
    merged.into_iter().collect()
}

impl KvStore for StagedStore<'_> {
    fn set(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), VeError> {
        self.pending.insert(key.to_vec(), Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), VeError> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }
}
