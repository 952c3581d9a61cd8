//! Edge store trait definitions

use crate::model::MergedEdge;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a commit changed in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub inserted: usize,
    pub updated: usize,
}

impl CommitResult {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Trait for edge persistence backends.
///
/// `upsert_edges` must be idempotent: committing the same edge set twice
/// produces the same stored state, with no duplicate rows.
/// Implementations must be thread-safe (Send + Sync).
pub trait EdgeStore: Send + Sync {
    /// Insert or update edges, keyed by (source, target, relation).
    fn upsert_edges(&self, edges: &[MergedEdge]) -> StorageResult<CommitResult>;

    /// Load all stored edges.
    fn load_edges(&self) -> StorageResult<Vec<MergedEdge>>;

    /// Number of stored edges.
    fn edge_count(&self) -> StorageResult<usize>;
}
