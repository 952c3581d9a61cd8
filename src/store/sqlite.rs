//! SQLite persistence backend for merged edges
//!
//! A single database file with one table keyed on the edge triple.
//! Thread-safe via internal mutex on the connection. Upserts are
//! idempotent: committing the same edge set twice leaves the same
//! stored state.

use super::traits::{CommitResult, EdgeStore, StorageResult};
use crate::model::{EdgeKey, EdgeStatus, MergedEdge, RelationType, StandardCode};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed edge store.
pub struct SqliteEdgeStore {
    conn: Mutex<Connection>,
}

impl SqliteEdgeStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS edges (
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                relation TEXT NOT NULL,
                confidence REAL NOT NULL,
                weight REAL NOT NULL,
                sources_json TEXT NOT NULL,
                status TEXT NOT NULL,
                note TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (source, target, relation)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_status ON edges(status);
            CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation);
            "#,
        )?;
        Ok(())
    }

    fn status_str(status: EdgeStatus) -> &'static str {
        match status {
            EdgeStatus::Accepted => "accepted",
            EdgeStatus::Rejected => "rejected",
            EdgeStatus::NeedsReview => "needs-review",
        }
    }

    fn parse_status(raw: &str) -> EdgeStatus {
        match raw {
            "rejected" => EdgeStatus::Rejected,
            "needs-review" => EdgeStatus::NeedsReview,
            _ => EdgeStatus::Accepted,
        }
    }
}

impl EdgeStore for SqliteEdgeStore {
    fn upsert_edges(&self, edges: &[MergedEdge]) -> StorageResult<CommitResult> {
        let mut conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let tx = conn.transaction()?;
        let mut result = CommitResult::default();

        for edge in edges {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM edges WHERE source = ?1 AND target = ?2 AND relation = ?3",
                    params![
                        edge.key.source.as_str(),
                        edge.key.target.as_str(),
                        edge.key.relation.as_str()
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                r#"
                INSERT INTO edges
                    (source, target, relation, confidence, weight, sources_json,
                     status, note, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT (source, target, relation) DO UPDATE SET
                    confidence = excluded.confidence,
                    weight = excluded.weight,
                    sources_json = excluded.sources_json,
                    status = excluded.status,
                    note = excluded.note,
                    updated_at = excluded.updated_at
                "#,
                params![
                    edge.key.source.as_str(),
                    edge.key.target.as_str(),
                    edge.key.relation.as_str(),
                    edge.final_confidence,
                    edge.weight,
                    serde_json::to_string(&edge.contributing_sources)?,
                    Self::status_str(edge.status),
                    edge.note,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            if exists.is_some() {
                result.updated += 1;
            } else {
                result.inserted += 1;
            }
        }

        tx.commit()?;
        Ok(result)
    }

    fn load_edges(&self) -> StorageResult<Vec<MergedEdge>> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT source, target, relation, confidence, weight, sources_json, status, note
             FROM edges ORDER BY source, target, relation",
        )?;

        let rows = stmt.query_map([], |row| {
            let source: String = row.get(0)?;
            let target: String = row.get(1)?;
            let relation: String = row.get(2)?;
            let confidence: f64 = row.get(3)?;
            let weight: f64 = row.get(4)?;
            let sources_json: String = row.get(5)?;
            let status: String = row.get(6)?;
            let note: Option<String> = row.get(7)?;
            Ok((
                source, target, relation, confidence, weight, sources_json, status, note,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (source, target, relation, confidence, weight, sources_json, status, note) = row?;
            // Stored rows were validated on the way in; a parse failure
            // here means the database was edited out-of-band.
            let (source, target, relation) = match (
                StandardCode::parse(&source),
                StandardCode::parse(&target),
                RelationType::parse(&relation),
            ) {
                (Ok(s), Ok(t), Ok(r)) => (s, t, r),
                _ => continue,
            };
            let contributing: BTreeSet<String> =
                serde_json::from_str(&sources_json).unwrap_or_default();
            edges.push(MergedEdge {
                key: EdgeKey::new(source, target, relation),
                final_confidence: confidence,
                weight,
                contributing_sources: contributing,
                status: Self::parse_status(&status),
                note,
            });
        }
        Ok(edges)
    }

    fn edge_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: &str, target: &str, confidence: f64) -> MergedEdge {
        MergedEdge {
            key: EdgeKey::new(
                StandardCode::parse(source).unwrap(),
                StandardCode::parse(target).unwrap(),
                RelationType::Prerequisite,
            ),
            final_confidence: confidence,
            weight: confidence,
            contributing_sources: BTreeSet::from(["p1".to_string()]),
            status: EdgeStatus::Accepted,
            note: None,
        }
    }

    #[test]
    fn upsert_then_load_round_trips() {
        let store = SqliteEdgeStore::open_in_memory().unwrap();
        let edges = vec![edge("A-1", "B-1", 0.8), edge("B-1", "C-1", 0.7)];

        let result = store.upsert_edges(&edges).unwrap();
        assert_eq!(result.inserted, 2);
        assert_eq!(result.updated, 0);

        let loaded = store.load_edges().unwrap();
        assert_eq!(loaded, edges);
    }

    #[test]
    fn upsert_is_idempotent() {
        let store = SqliteEdgeStore::open_in_memory().unwrap();
        let edges = vec![edge("A-1", "B-1", 0.8)];

        store.upsert_edges(&edges).unwrap();
        let second = store.upsert_edges(&edges).unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 1);
        assert_eq!(store.edge_count().unwrap(), 1);
        assert_eq!(store.load_edges().unwrap(), edges);
    }

    #[test]
    fn re_merge_overwrites_existing_triple() {
        let store = SqliteEdgeStore::open_in_memory().unwrap();
        store.upsert_edges(&[edge("A-1", "B-1", 0.8)]).unwrap();
        store.upsert_edges(&[edge("A-1", "B-1", 0.6)]).unwrap();

        let loaded = store.load_edges().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].final_confidence, 0.6);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.db");

        {
            let store = SqliteEdgeStore::open(&path).unwrap();
            store.upsert_edges(&[edge("A-1", "B-1", 0.8)]).unwrap();
        }

        let store = SqliteEdgeStore::open(&path).unwrap();
        assert_eq!(store.edge_count().unwrap(), 1);
    }
}
