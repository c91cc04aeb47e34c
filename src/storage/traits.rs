//! Abstract storage traits for plugseed.
//!
//! These traits define the contract a backing store must implement. The store
//! knows nothing about schemas: cascade rules and validation live in the
//! registry layer on top of it.

use thiserror::Error;

use crate::record::{Fields, Record, RecordId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Record not found.
    #[error("Record not found: {entity} {id}")]
    RecordNotFound {
        /// Entity label.
        entity: String,
        /// Missing id.
        id: RecordId,
    },

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// An exact-match lookup that must be unique matched several records.
    #[error("{count} {entity} records match {filter}")]
    MultipleMatches {
        /// Entity label.
        entity: String,
        /// Rendered filter.
        filter: String,
        /// Number of matches.
        count: usize,
    },

    /// A delete was blocked by a restricting reference.
    #[error("Delete restricted: {0}")]
    Restricted(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Storage trait for records of any entity type.
///
/// Records are partitioned by entity label. Scans return records in
/// insertion order.
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Returns error if the id already exists.
    fn insert(&self, record: Record) -> Result<(), StorageError>;

    /// Get a record by id.
    fn get(&self, entity: &str, id: RecordId) -> Result<Option<Record>, StorageError>;

    /// Replace an existing record. Returns error if not found.
    fn update(&self, record: Record) -> Result<(), StorageError>;

    /// Delete a record by id. Returns error if not found.
    fn delete(&self, entity: &str, id: RecordId) -> Result<(), StorageError>;

    /// Records whose fields equal every entry of `filter` (absent = null).
    fn find(&self, entity: &str, filter: &Fields) -> Result<Vec<Record>, StorageError>;

    /// Every record of an entity type.
    fn scan(&self, entity: &str) -> Result<Vec<Record>, StorageError> {
        self.find(entity, &Fields::new())
    }

    /// Number of records of an entity type.
    fn count(&self, entity: &str) -> Result<usize, StorageError> {
        Ok(self.scan(entity)?.len())
    }
}
