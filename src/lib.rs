//! # plugseed - declarative, idempotent record seeding
//!
//! plugseed ensures that a fixed set of records exists in a relational-style
//! store. Records are described as [`Shape`]s; single-reference fields may
//! hold nested shapes or identity keys, which are resolved depth-first
//! against the referenced entity type before a get-or-create.
//!
//! ## Core Concepts
//!
//! - **Schema**: entity types with a static field classification
//!   (scalar, single reference, multi reference)
//! - **Registry**: schema plus store; resolves `app.Model` labels to handles
//! - **Upserter**: resolves references and gets or creates records
//! - **SeedSet / SeedMigration**: a migration step that seeds one primary
//!   record and its dependents, skipping entirely if the primary exists
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use plugseed::{plugins, run_forward_migration, InMemoryRecordStore, Registry};
//!
//! let registry = Registry::new(plugins::schema()?, Arc::new(InMemoryRecordStore::new()));
//! let seed = plugins::doc_info::seed_set()?;
//!
//! run_forward_migration(&registry, &seed)?;
//! assert_eq!(
//!     run_forward_migration(&registry, &seed)?,
//!     plugseed::ForwardOutcome::Skipped
//! );
//! # Ok::<(), plugseed::SeedError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod migration;
pub mod plugins;
pub mod record;
pub mod registry;
pub mod schema;
pub mod shape;
pub mod storage;
pub mod upsert;
pub mod validation;
pub mod value;

// Re-export primary types at crate root for convenience
pub use error::{NotFoundError, SchemaError, SeedError, SeedResult, ValidationError};
pub use migration::{
    run_forward_migration, run_reverse_migration, ForwardOutcome, Migration, MigrationId,
    SeedGroup, SeedMigration, SeedSet,
};
pub use record::{Fields, Record, RecordId};
pub use registry::{EntityHandle, Registry};
pub use schema::{EntityType, FieldDef, FieldKind, OnDelete, PrimaryKey, ScalarType, Schema};
pub use shape::Shape;
pub use storage::{InMemoryRecordStore, RecordStore, StorageError};
pub use upsert::Upserter;
pub use value::Value;
