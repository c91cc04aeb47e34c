//! In-memory storage backend.
//!
//! Thread-safe in-memory implementation of [`RecordStore`]. It is intended for
//! embedded usage, tests, and as a reference implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::record::{Fields, Record, RecordId};
use crate::storage::traits::{RecordStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct Table {
    // Insertion sequence -> record; keeps scans in creation order.
    rows: BTreeMap<u64, Record>,
    by_id: HashMap<RecordId, u64>,
    next_seq: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    tables: HashMap<String, Table>,
    // Ids are unique across the whole store, not just per table.
    owner: HashMap<RecordId, String>,
}

/// Thread-safe in-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: RwLock<StoreState>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn insert(&self, record: Record) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.insert"))?;
        if state.owner.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey(record.id.to_string()));
        }

        state.owner.insert(record.id, record.entity.clone());
        let table = state.tables.entry(record.entity.clone()).or_default();
        let seq = table.next_seq;
        table.next_seq += 1;
        table.by_id.insert(record.id, seq);
        table.rows.insert(seq, record);
        Ok(())
    }

    fn get(&self, entity: &str, id: RecordId) -> Result<Option<Record>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.get"))?;
        let Some(table) = state.tables.get(entity) else {
            return Ok(None);
        };
        Ok(table
            .by_id
            .get(&id)
            .and_then(|seq| table.rows.get(seq))
            .cloned())
    }

    fn update(&self, record: Record) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.update"))?;
        let not_found = || StorageError::RecordNotFound {
            entity: record.entity.clone(),
            id: record.id,
        };
        let table = state.tables.get_mut(&record.entity).ok_or_else(not_found)?;
        let seq = *table.by_id.get(&record.id).ok_or_else(not_found)?;
        table.rows.insert(seq, record);
        Ok(())
    }

    fn delete(&self, entity: &str, id: RecordId) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("record.delete"))?;
        let not_found = || StorageError::RecordNotFound {
            entity: entity.to_string(),
            id,
        };
        let table = state.tables.get_mut(entity).ok_or_else(not_found)?;
        let seq = table.by_id.remove(&id).ok_or_else(not_found)?;
        table.rows.remove(&seq);
        state.owner.remove(&id);
        Ok(())
    }

    fn find(&self, entity: &str, filter: &Fields) -> Result<Vec<Record>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.find"))?;
        let Some(table) = state.tables.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows
            .values()
            .filter(|r| r.matches(filter))
            .cloned()
            .collect())
    }

    fn count(&self, entity: &str) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("record.count"))?;
        Ok(state.tables.get(entity).map_or(0, |t| t.rows.len()))
    }
}
