//! SQLite persistence for roster snapshots and decision batches.
//!
//! One snapshot row per committed iteration; one decision row per batch the
//! policy engine produced. Rows carry the canonical fingerprint of their
//! payload so runs can be compared without diffing JSON.

use crate::canonical;
use crate::types::{DecisionBatch, RosterState};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Malformed roster state in {origin}: {reason}")]
    Malformed { origin: String, reason: String },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSummary {
    pub iteration: u64,
    pub digest: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub iteration: u64,
    pub digest: String,
    pub batch: DecisionBatch,
    pub created_at: String,
}

pub struct SnapshotStore {
    db: Mutex<Connection>,
}

impl SnapshotStore {
    /// Open or create the store. `":memory:"` gives a private in-memory db.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        if path != ":memory:" {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        let store = SnapshotStore { db: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.db.lock().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshots (
                iteration INTEGER PRIMARY KEY,
                state_json TEXT NOT NULL,
                digest TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS decisions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                iteration INTEGER NOT NULL,
                batch_json TEXT NOT NULL,
                digest TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_decisions_iteration ON decisions(iteration);
            ",
        )?;
        Ok(())
    }

    /// Persist `state` under its iteration, replacing any earlier row for the
    /// same iteration. Returns the snapshot digest.
    pub fn save_snapshot(&self, state: &RosterState) -> Result<String, StoreError> {
        let json = serde_json::to_string(state)?;
        let digest = canonical::fingerprint(state)?;
        self.db.lock().execute(
            "INSERT OR REPLACE INTO snapshots (iteration, state_json, digest, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![state.iteration as i64, json, digest, now()],
        )?;
        tracing::debug!(iteration = state.iteration, %digest, "Snapshot saved");
        Ok(digest)
    }

    /// The snapshot with the highest iteration, if any.
    pub fn load_latest(&self) -> Result<Option<RosterState>, StoreError> {
        let row: Option<(i64, String)> = self
            .db
            .lock()
            .query_row(
                "SELECT iteration, state_json FROM snapshots ORDER BY iteration DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(iteration, json)| parse_state(&json, &format!("snapshot {iteration}")))
            .transpose()
    }

    pub fn load_snapshot(&self, iteration: u64) -> Result<Option<RosterState>, StoreError> {
        let json: Option<String> = self
            .db
            .lock()
            .query_row(
                "SELECT state_json FROM snapshots WHERE iteration = ?1",
                params![iteration as i64],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| parse_state(&j, &format!("snapshot {iteration}")))
            .transpose()
    }

    /// All snapshots, oldest first.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotSummary>, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare("SELECT iteration, digest, created_at FROM snapshots ORDER BY iteration")?;
        let rows = stmt.query_map([], |row| {
            Ok(SnapshotSummary {
                iteration: row.get::<_, i64>(0)? as u64,
                digest: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Log the batch decided at `iteration`. Returns its digest.
    pub fn record_decision(&self, iteration: u64, batch: &DecisionBatch) -> Result<String, StoreError> {
        let json = serde_json::to_string(batch)?;
        let digest = canonical::fingerprint(batch)?;
        self.db.lock().execute(
            "INSERT INTO decisions (iteration, batch_json, digest, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![iteration as i64, json, digest, now()],
        )?;
        Ok(digest)
    }

    pub fn decisions_for(&self, iteration: u64) -> Result<Vec<DecisionRecord>, StoreError> {
        let db = self.db.lock();
        let mut stmt = db.prepare(
            "SELECT batch_json, digest, created_at FROM decisions WHERE iteration = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![iteration as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (json, digest, created_at) = row?;
            out.push(DecisionRecord {
                iteration,
                digest,
                batch: serde_json::from_str(&json)?,
                created_at,
            });
        }
        Ok(out)
    }
}

/// Read a `RosterState` JSON document from disk with the same strictness as
/// a stored snapshot.
pub fn load_state_file(path: impl AsRef<Path>) -> Result<RosterState, StoreError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_state(&json, &path.display().to_string())
}

/// Strict parse: missing `iteration`, `workers` or `score_history` is an
/// error, as is a roster that breaks name or range invariants. The team cap
/// is checked by `Roster::new`, which knows it.
fn parse_state(json: &str, origin: &str) -> Result<RosterState, StoreError> {
    let malformed = |reason: String| StoreError::Malformed {
        origin: origin.to_string(),
        reason,
    };
    let state: RosterState = serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
    state.validate(usize::MAX).map_err(|e| malformed(e.to_string()))?;
    Ok(state)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HirePlan, Worker};
    use std::io::Write;

    fn state(iteration: u64) -> RosterState {
        let mut s = RosterState {
            iteration,
            ..Default::default()
        };
        s.workers.push(Worker::new("Explainer", "writer.specialist", "p"));
        s
    }

    #[test]
    fn latest_snapshot_wins() {
        let store = SnapshotStore::open(":memory:").unwrap();
        assert!(store.load_latest().unwrap().is_none());
        store.save_snapshot(&state(1)).unwrap();
        store.save_snapshot(&state(3)).unwrap();
        store.save_snapshot(&state(2)).unwrap();
        assert_eq!(store.load_latest().unwrap().unwrap().iteration, 3);
        assert_eq!(store.load_snapshot(2).unwrap().unwrap().iteration, 2);
        assert!(store.load_snapshot(9).unwrap().is_none());

        let listed: Vec<u64> = store.list_snapshots().unwrap().iter().map(|s| s.iteration).collect();
        assert_eq!(listed, vec![1, 2, 3]);
    }

    #[test]
    fn snapshot_digest_is_stable() {
        let store = SnapshotStore::open(":memory:").unwrap();
        let a = store.save_snapshot(&state(1)).unwrap();
        let b = store.save_snapshot(&state(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.list_snapshots().unwrap().len(), 1);
    }

    #[test]
    fn stored_row_missing_workers_is_malformed() {
        let store = SnapshotStore::open(":memory:").unwrap();
        store
            .db
            .lock()
            .execute(
                "INSERT INTO snapshots (iteration, state_json, digest, created_at) VALUES (4, ?1, 'x', 'now')",
                params![r#"{"iteration": 4, "score_history": {"avg_overall": [], "dims_mean": {}, "content_history": []}}"#],
            )
            .unwrap();
        assert!(matches!(store.load_latest(), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn duplicate_names_are_malformed() {
        let mut s = state(1);
        s.workers.push(Worker::new("Explainer", "critic.specialist", "p"));
        let json = serde_json::to_string(&s).unwrap();
        assert!(matches!(parse_state(&json, "test"), Err(StoreError::Malformed { .. })));
    }

    #[test]
    fn out_of_range_history_is_malformed() {
        let mut s = state(1);
        s.score_history.avg_overall.push(0.8);
        let mut value = serde_json::to_value(&s).unwrap();
        value["score_history"]["avg_overall"][0] = serde_json::json!(7.5);
        let json = value.to_string();
        let err = parse_state(&json, "test").unwrap_err();
        assert!(matches!(err, StoreError::Malformed { ref reason, .. } if reason.contains("avg_overall[0]")));
    }

    #[test]
    fn decisions_round_trip_per_iteration() {
        let store = SnapshotStore::open(":memory:").unwrap();
        let batch = DecisionBatch {
            hire_plan: vec![HirePlan {
                name: "HotTake".into(),
                role: "writer.specialist".into(),
                system_prompt: "p".into(),
                reason: "novelty=0.52 < 0.55".into(),
                is_core: false,
            }],
            ..Default::default()
        };
        let digest = store.record_decision(2, &batch).unwrap();
        store.record_decision(3, &DecisionBatch::default()).unwrap();

        let logged = store.decisions_for(2).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].batch, batch);
        assert_eq!(logged[0].digest, digest);
        assert!(store.decisions_for(7).unwrap().is_empty());
    }

    #[test]
    fn state_file_is_read_strictly() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(good, "{}", serde_json::to_string(&state(5)).unwrap()).unwrap();
        assert_eq!(load_state_file(good.path()).unwrap().iteration, 5);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"iteration": 5, "workers": []}}"#).unwrap();
        assert!(matches!(load_state_file(bad.path()), Err(StoreError::Malformed { .. })));

        assert!(matches!(
            load_state_file("/nonexistent/cadre.json"),
            Err(StoreError::Io { .. })
        ));
    }
}
