//! In-memory edge store for tests and dry experiments

use super::traits::{CommitResult, EdgeStore, StorageResult};
use crate::model::{EdgeKey, MergedEdge};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Edge store backed by a plain map. Same idempotence contract as the
/// SQLite store.
#[derive(Default)]
pub struct MemoryEdgeStore {
    edges: Mutex<BTreeMap<EdgeKey, MergedEdge>>,
}

impl MemoryEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EdgeStore for MemoryEdgeStore {
    fn upsert_edges(&self, edges: &[MergedEdge]) -> StorageResult<CommitResult> {
        let mut map = self.edges.lock().expect("edge map lock poisoned");
        let mut result = CommitResult::default();
        for edge in edges {
            if map.insert(edge.key.clone(), edge.clone()).is_some() {
                result.updated += 1;
            } else {
                result.inserted += 1;
            }
        }
        Ok(result)
    }

    fn load_edges(&self) -> StorageResult<Vec<MergedEdge>> {
        let map = self.edges.lock().expect("edge map lock poisoned");
        Ok(map.values().cloned().collect())
    }

    fn edge_count(&self) -> StorageResult<usize> {
        let map = self.edges.lock().expect("edge map lock poisoned");
        Ok(map.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeStatus, RelationType, StandardCode};
    use std::collections::BTreeSet;

    #[test]
    fn memory_store_is_idempotent() {
        let store = MemoryEdgeStore::new();
        let edge = MergedEdge {
            key: EdgeKey::new(
                StandardCode::parse("A-1").unwrap(),
                StandardCode::parse("B-1").unwrap(),
                RelationType::SimilarTo,
            ),
            final_confidence: 0.7,
            weight: 0.42,
            contributing_sources: BTreeSet::new(),
            status: EdgeStatus::Accepted,
            note: None,
        };

        assert_eq!(store.upsert_edges(&[edge.clone()]).unwrap().inserted, 1);
        assert_eq!(store.upsert_edges(&[edge]).unwrap().updated, 1);
        assert_eq!(store.edge_count().unwrap(), 1);
    }
}
