//! Error types for plugseed.
//!
//! All errors are strongly typed using thiserror so that a migration runner
//! can pattern match on the failure class (validation vs. missing data vs.
//! backend trouble) before halting a deployment.

use thiserror::Error;

use crate::storage::StorageError;

/// Constraint violations raised before a record is persisted.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is not declared on {entity}")]
    UnknownField {
        entity: String,
        field: String,
    },

    #[error("Required field '{field}' is missing on {entity}")]
    MissingField {
        entity: String,
        field: String,
    },

    #[error("Field '{field}' on {entity} expects {expected}, got {actual}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Field '{field}' on {entity} exceeds maximum length of {max_length}")]
    FieldTooLong {
        entity: String,
        field: String,
        max_length: usize,
    },

    #[error("Value {value:?} is not a valid choice for '{field}' on {entity}")]
    InvalidChoice {
        entity: String,
        field: String,
        value: String,
    },

    #[error("Value {value:?} for '{field}' on {entity} does not match /{pattern}/")]
    PatternMismatch {
        entity: String,
        field: String,
        value: String,
        pattern: String,
    },

    #[error("Value {value:?} for '{field}' on {entity} is not an RFC 3339 timestamp")]
    InvalidTimestamp {
        entity: String,
        field: String,
        value: String,
    },

    #[error("{entity} with {field}={value} already exists")]
    Duplicate {
        entity: String,
        field: String,
        value: String,
    },
}

/// Lookups that did not resolve to anything.
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("Entity type not registered: {label}")]
    EntityType {
        label: String,
    },

    #[error("{entity} matching {key} does not exist (referenced by '{field}')")]
    Reference {
        entity: String,
        field: String,
        key: String,
    },

    #[error("{entity} matching {filter} does not exist")]
    Record {
        entity: String,
        filter: String,
    },
}

/// Errors in a schema definition, detected when the schema is built.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Entity type registered twice: {label}")]
    DuplicateEntity {
        label: String,
    },

    #[error("Field '{field}' declared twice on {entity}")]
    DuplicateField {
        entity: String,
        field: String,
    },

    #[error("Field '{field}' on {entity} references unknown entity type {target}")]
    UnknownTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("Primary key field '{field}' is not declared on {entity}")]
    UnknownPrimaryKey {
        entity: String,
        field: String,
    },

    #[error("Field '{field}' on {entity} uses SET NULL but is not nullable")]
    SetNullOnRequired {
        entity: String,
        field: String,
    },

    #[error("Invalid pattern for '{field}' on {entity}: {reason}")]
    InvalidPattern {
        entity: String,
        field: String,
        reason: String,
    },
}

/// Top-level error type for plugseed.
///
/// Every variant is fatal for the migration step that raised it.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SeedError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a schema error.
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for plugseed operations.
pub type SeedResult<T> = Result<T, SeedError>;
