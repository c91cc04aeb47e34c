//! Storage for plugseed records.
//!
//! The traits define the backing-store contract; [`InMemoryRecordStore`] is
//! the embedded reference backend used by tests and local tooling.

mod memory;
mod traits;

pub use memory::InMemoryRecordStore;
pub use traits::{RecordStore, StorageError};
