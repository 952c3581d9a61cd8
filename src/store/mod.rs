//! Persistence adapters for the validated edge set

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryEdgeStore;
pub use sqlite::SqliteEdgeStore;
pub use traits::{CommitResult, EdgeStore, StorageError, StorageResult};
