//! Append-only checkpoint log
//!
//! One row per completed stage, carrying the serialized output
//! artifact. Written by exactly one writer (the controller) per run.
//! Resume invalidates rows rather than deleting them, so the history
//! stays auditable.

use super::stage::StageData;
use crate::store::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// A durable marker of pipeline progress.
#[derive(Debug, Clone)]
pub struct StageCheckpoint {
    pub stage_name: String,
    pub completed_at: DateTime<Utc>,
    pub artifact: StageData,
}

/// SQLite-backed checkpoint log.
pub struct CheckpointLog {
    conn: Mutex<Connection>,
}

impl CheckpointLog {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

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
            CREATE TABLE IF NOT EXISTS checkpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                stage TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                artifact_json TEXT NOT NULL,
                invalidated INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_checkpoints_stage
                ON checkpoints(stage, invalidated);
            "#,
        )?;
        Ok(())
    }

    /// Append a checkpoint for a completed stage.
    pub fn append(&self, run_id: Uuid, stage: &str, artifact: &StageData) -> StorageResult<()> {
        let conn = self.conn.lock().expect("checkpoint lock poisoned");
        conn.execute(
            "INSERT INTO checkpoints (run_id, stage, completed_at, artifact_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id.to_string(),
                stage,
                Utc::now().to_rfc3339(),
                serde_json::to_string(artifact)?,
            ],
        )?;
        Ok(())
    }

    /// The most recent valid checkpoint for a stage, if any.
    pub fn latest(&self, stage: &str) -> StorageResult<Option<StageCheckpoint>> {
        let conn = self.conn.lock().expect("checkpoint lock poisoned");
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT completed_at, artifact_json FROM checkpoints
                 WHERE stage = ?1 AND invalidated = 0
                 ORDER BY id DESC LIMIT 1",
                params![stage],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((completed_at, artifact_json)) => {
                let completed_at = completed_at
                    .parse::<DateTime<Utc>>()
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
                let artifact: StageData = serde_json::from_str(&artifact_json)?;
                Ok(Some(StageCheckpoint {
                    stage_name: stage.to_string(),
                    completed_at,
                    artifact,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn has_valid(&self, stage: &str) -> StorageResult<bool> {
        Ok(self.latest(stage)?.is_some())
    }

    /// Invalidate every checkpoint for the given stages. Used on resume
    /// so a partial re-run cannot leave stale artifacts from a future
    /// stage.
    pub fn invalidate(&self, stages: &[&str]) -> StorageResult<usize> {
        let conn = self.conn.lock().expect("checkpoint lock poisoned");
        let mut invalidated = 0;
        for stage in stages {
            invalidated += conn.execute(
                "UPDATE checkpoints SET invalidated = 1 WHERE stage = ?1 AND invalidated = 0",
                params![stage],
            )?;
        }
        Ok(invalidated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_latest() {
        let log = CheckpointLog::open_in_memory().unwrap();
        let run = Uuid::new_v4();

        log.append(run, "candidates", &StageData::Proposals(vec![]))
            .unwrap();

        let checkpoint = log.latest("candidates").unwrap().unwrap();
        assert_eq!(checkpoint.stage_name, "candidates");
        assert!(matches!(checkpoint.artifact, StageData::Proposals(_)));
        assert!(log.latest("merge").unwrap().is_none());
    }

    #[test]
    fn newer_checkpoint_supersedes_older() {
        let log = CheckpointLog::open_in_memory().unwrap();
        let run = Uuid::new_v4();

        log.append(run, "candidates", &StageData::Empty).unwrap();
        log.append(run, "candidates", &StageData::Proposals(vec![]))
            .unwrap();

        let latest = log.latest("candidates").unwrap().unwrap();
        assert!(matches!(latest.artifact, StageData::Proposals(_)));
    }

    #[test]
    fn invalidated_checkpoints_not_returned() {
        let log = CheckpointLog::open_in_memory().unwrap();
        let run = Uuid::new_v4();

        log.append(run, "merge", &StageData::Empty).unwrap();
        assert!(log.has_valid("merge").unwrap());

        let count = log.invalidate(&["merge", "validate"]).unwrap();
        assert_eq!(count, 1);
        assert!(!log.has_valid("merge").unwrap());
    }
}
