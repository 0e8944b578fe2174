//! SQLite-backed experiment tracking.
//!
//! Every stage records its parameters, metrics and output artifacts under
//! a run row. Tracking is strictly best effort: stages log through a
//! [`StageRun`] handle that swallows storage failures with a warning, so a
//! missing or broken tracking database never blocks the pipeline outputs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

pub const STATUS_RUNNING: &str = "running";
pub const STATUS_FINISHED: &str = "finished";
pub const STATUS_FAILED: &str = "failed";

/// Thread-safe SQLite connection (single connection with mutex)
#[derive(Clone)]
pub struct TrackingStore {
    conn: Arc<Mutex<Connection>>,
}

impl TrackingStore {
    /// Open (or create) the tracking database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = TrackingStore {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Runs ─────────────────────────────────────────────────────────────────

    /// Start a run under an experiment and return its row id
    pub fn start_run(&self, experiment: &str, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs (experiment, name, status, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![experiment, name, STATUS_RUNNING, Utc::now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Mark a run finished (or failed) with a completion timestamp
    pub fn finish_run(&self, run_id: i64, status: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE runs SET status=?1, finished_at=?2 WHERE id=?3",
            params![status, Utc::now(), run_id],
        )?;
        Ok(())
    }

    /// List runs of one experiment, newest first
    pub fn list_runs(&self, experiment: &str) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, experiment, name, status, started_at, finished_at
             FROM runs WHERE experiment=?1 ORDER BY started_at DESC, id DESC",
        )?;
        let runs = stmt
            .query_map(params![experiment], map_run)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(runs)
    }

    // ── Params / metrics / artifacts ─────────────────────────────────────────

    pub fn log_param(&self, run_id: i64, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO run_params (run_id, key, value) VALUES (?1, ?2, ?3)",
            params![run_id, key, value],
        )?;
        Ok(())
    }

    pub fn log_metric(&self, run_id: i64, key: &str, value: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO run_metrics (run_id, key, value, recorded_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, key, value, Utc::now()],
        )?;
        Ok(())
    }

    /// Record an output file with its on-disk size when it is readable
    pub fn log_artifact(&self, run_id: i64, path: &Path) -> Result<()> {
        let size_bytes = std::fs::metadata(path).map(|m| m.len() as i64).ok();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO run_artifacts (run_id, path, size_bytes, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![run_id, path.to_string_lossy(), size_bytes, Utc::now()],
        )?;
        Ok(())
    }

    pub fn run_params(&self, run_id: i64) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT key, value FROM run_params WHERE run_id=?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn run_metrics(&self, run_id: i64) -> Result<Vec<(String, f64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT key, value FROM run_metrics WHERE run_id=?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn run_artifacts(&self, run_id: i64) -> Result<Vec<(String, Option<i64>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT path, size_bytes FROM run_artifacts WHERE run_id=?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_run(row: &rusqlite::Row) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        experiment: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    experiment  TEXT    NOT NULL,
    name        TEXT    NOT NULL,
    status      TEXT    NOT NULL DEFAULT 'running',
    started_at  TEXT    NOT NULL,
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS run_params (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL,
    key    TEXT    NOT NULL,
    value  TEXT    NOT NULL,
    FOREIGN KEY (run_id) REFERENCES runs(id)
);

CREATE TABLE IF NOT EXISTS run_metrics (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id      INTEGER NOT NULL,
    key         TEXT    NOT NULL,
    value       REAL    NOT NULL,
    recorded_at TEXT    NOT NULL,
    FOREIGN KEY (run_id) REFERENCES runs(id)
);

CREATE TABLE IF NOT EXISTS run_artifacts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id      INTEGER NOT NULL,
    path        TEXT    NOT NULL,
    size_bytes  INTEGER,
    recorded_at TEXT    NOT NULL,
    FOREIGN KEY (run_id) REFERENCES runs(id)
);

CREATE INDEX IF NOT EXISTS idx_runs_experiment ON runs(experiment);
CREATE INDEX IF NOT EXISTS idx_run_params_run ON run_params(run_id);
CREATE INDEX IF NOT EXISTS idx_run_metrics_run ON run_metrics(run_id);
CREATE INDEX IF NOT EXISTS idx_run_artifacts_run ON run_artifacts(run_id);
"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub experiment: String,
    pub name: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Best-effort handle for one stage's run. Every method degrades to a
/// warning when recording fails or the handle was opened disabled.
pub struct StageRun {
    store: Option<TrackingStore>,
    run_id: i64,
}

impl StageRun {
    /// Handle that records nothing; used when the store cannot be opened.
    pub fn disabled() -> Self {
        StageRun {
            store: None,
            run_id: 0,
        }
    }

    pub fn run_id(&self) -> Option<i64> {
        self.store.as_ref().map(|_| self.run_id)
    }

    pub fn param(&self, key: &str, value: impl std::fmt::Display) {
        if let Some(store) = &self.store {
            if let Err(e) = store.log_param(self.run_id, key, &value.to_string()) {
                warn!("failed to record param {}: {}", key, e);
            }
        }
    }

    pub fn metric(&self, key: &str, value: f64) {
        if let Some(store) = &self.store {
            if let Err(e) = store.log_metric(self.run_id, key, value) {
                warn!("failed to record metric {}: {}", key, e);
            }
        }
    }

    pub fn artifact(&self, path: &Path) {
        if let Some(store) = &self.store {
            if let Err(e) = store.log_artifact(self.run_id, path) {
                warn!("failed to record artifact {}: {}", path.display(), e);
            }
        }
    }

    pub fn finish(&self, status: &str) {
        if let Some(store) = &self.store {
            if let Err(e) = store.finish_run(self.run_id, status) {
                warn!("failed to close run {}: {}", self.run_id, e);
            }
        }
    }
}

/// Open the store and start a run, degrading to a disabled handle on error.
pub fn start_stage_run(db_path: &Path, experiment: &str, name: &str) -> StageRun {
    let started = TrackingStore::open(db_path).and_then(|store| {
        let run_id = store.start_run(experiment, name)?;
        Ok((store, run_id))
    });
    match started {
        Ok((store, run_id)) => StageRun {
            store: Some(store),
            run_id,
        },
        Err(e) => {
            warn!("tracking unavailable, continuing without it: {}", e);
            StageRun::disabled()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_lifecycle_round_trips() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tracking.db");
        let store = TrackingStore::open(&db_path).unwrap();

        let run_id = store.start_run("training", "train").unwrap();
        store.log_param(run_id, "seed", "42").unwrap();
        store.log_metric(run_id, "log_loss", 0.61).unwrap();
        store.finish_run(run_id, STATUS_FINISHED).unwrap();

        let runs = store.list_runs("training").unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "train");
        assert_eq!(runs[0].status, STATUS_FINISHED);
        assert!(runs[0].finished_at.is_some());

        assert_eq!(
            store.run_params(run_id).unwrap(),
            vec![("seed".to_string(), "42".to_string())]
        );
        assert_eq!(
            store.run_metrics(run_id).unwrap(),
            vec![("log_loss".to_string(), 0.61)]
        );
    }

    #[test]
    fn artifacts_capture_the_file_size() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tracking.db");
        let artifact_path = dir.path().join("final_model.json");
        std::fs::write(&artifact_path, b"{}").unwrap();

        let store = TrackingStore::open(&db_path).unwrap();
        let run_id = store.start_run("training", "train").unwrap();
        store.log_artifact(run_id, &artifact_path).unwrap();
        store
            .log_artifact(run_id, Path::new("never/created.parquet"))
            .unwrap();

        let artifacts = store.run_artifacts(run_id).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].1, Some(2));
        assert_eq!(artifacts[1].1, None);
    }

    #[test]
    fn reopening_the_store_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("tracking.db");
        {
            let store = TrackingStore::open(&db_path).unwrap();
            store.start_run("scoring", "score").unwrap();
        }
        let store = TrackingStore::open(&db_path).unwrap();
        assert_eq!(store.list_runs("scoring").unwrap().len(), 1);
        assert_eq!(store.list_runs("training").unwrap().len(), 0);
    }

    #[test]
    fn disabled_handle_swallows_everything() {
        let run = StageRun::disabled();
        assert!(run.run_id().is_none());
        run.param("seed", 42);
        run.metric("log_loss", 0.5);
        run.artifact(Path::new("nowhere.parquet"));
        run.finish(STATUS_FINISHED);
    }

    #[test]
    fn unopenable_store_degrades_to_disabled() {
        let dir = tempdir().unwrap();
        let bad_path = dir.path().join("missing").join("tracking.db");
        let run = start_stage_run(&bad_path, "training", "train");
        assert!(run.run_id().is_none());
        run.metric("log_loss", 0.5);
    }
}
