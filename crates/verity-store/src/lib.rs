//! verity-store — Face detection history in SQLite.
//!
//! Records are append-only. Every operation opens its own short-lived
//! connection; each insert is a single statement, so a record is either fully
//! visible or not at all.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use verity_vision::FaceBox;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS detection_history (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name  TEXT    NOT NULL,
    timestamp  TEXT    NOT NULL,
    face_count INTEGER NOT NULL,
    boxes      TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_detection_history_timestamp
    ON detection_history (timestamp);
";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode boxes: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt history record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Input for a new history record. `face_count` is derived from `boxes`.
#[derive(Debug, Clone)]
pub struct NewDetection {
    pub file_name: String,
    pub boxes: Vec<FaceBox>,
}

/// A stored detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    pub id: i64,
    pub file_name: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub face_count: u32,
    pub boxes: Vec<FaceBox>,
}

/// Handle to the history database file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Open (creating if needed) the database and its schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        store.connect()?.execute_batch(SCHEMA)?;
        tracing::info!(path = %store.path.display(), "history store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    /// Append a record stamped with the current UTC time.
    pub fn insert(&self, new: &NewDetection) -> Result<DetectionRecord, StoreError> {
        self.insert_at(new, Utc::now())
    }

    /// Append a record with an explicit timestamp.
    pub fn insert_at(
        &self,
        new: &NewDetection,
        timestamp: DateTime<Utc>,
    ) -> Result<DetectionRecord, StoreError> {
        let boxes = serde_json::to_string(&new.boxes)?;
        let face_count = new.boxes.len() as u32;

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO detection_history (file_name, timestamp, face_count, boxes)
             VALUES (?1, ?2, ?3, ?4)",
            params![new.file_name, encode_timestamp(&timestamp), face_count, boxes],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(id, file_name = %new.file_name, face_count, "history record inserted");

        Ok(DetectionRecord {
            id,
            file_name: new.file_name.clone(),
            timestamp,
            face_count,
            boxes: new.boxes.clone(),
        })
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: u32) -> Result<Vec<DetectionRecord>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, file_name, timestamp, face_count, boxes
             FROM detection_history
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit], |row| {
            Ok(RawRecord {
                id: row.get(0)?,
                file_name: row.get(1)?,
                timestamp: row.get(2)?,
                face_count: row.get(3)?,
                boxes: row.get(4)?,
            })
        })?;

        rows.map(|row| row?.decode()).collect()
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .connect()?
            .query_row("SELECT COUNT(*) FROM detection_history", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

struct RawRecord {
    id: i64,
    file_name: String,
    timestamp: String,
    face_count: i64,
    boxes: String,
}

impl RawRecord {
    fn decode(self) -> Result<DetectionRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt { id: self.id, reason };

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| corrupt(format!("timestamp {:?}: {e}", self.timestamp)))?
            .with_timezone(&Utc);
        let boxes: Vec<FaceBox> = if self.boxes.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&self.boxes).map_err(|e| corrupt(format!("boxes: {e}")))?
        };
        let face_count =
            u32::try_from(self.face_count).map_err(|_| corrupt(format!("face_count {}", self.face_count)))?;

        Ok(DetectionRecord {
            id: self.id,
            file_name: self.file_name,
            timestamp,
            face_count,
            boxes,
        })
    }
}

/// Fixed-width RFC 3339 so that text order is chronological order.
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&encode_timestamp(ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn temp_store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("history.db")).unwrap();
        (dir, store)
    }

    fn detection(name: &str, faces: u32) -> NewDetection {
        NewDetection {
            file_name: name.to_string(),
            boxes: (0..faces).map(|i| FaceBox { x: i * 40, y: 10, w: 32, h: 32 }).collect(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let (_dir, store) = temp_store();
        let a = store.insert(&detection("a.jpg", 1)).unwrap();
        let b = store.insert(&detection("b.jpg", 0)).unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_face_count_matches_boxes() {
        let (_dir, store) = temp_store();
        let rec = store.insert(&detection("group.png", 3)).unwrap();
        assert_eq!(rec.face_count, 3);

        let stored = &store.recent(10).unwrap()[0];
        assert_eq!(stored.face_count as usize, stored.boxes.len());
        assert_eq!(stored, &rec_with_stored_precision(rec));
    }

    fn rec_with_stored_precision(mut rec: DetectionRecord) -> DetectionRecord {
        rec.timestamp = DateTime::parse_from_rfc3339(&encode_timestamp(&rec.timestamp))
            .unwrap()
            .with_timezone(&Utc);
        rec
    }

    #[test]
    fn test_zero_face_record() {
        let (_dir, store) = temp_store();
        store.insert(&detection("empty.jpg", 0)).unwrap();
        let rec = &store.recent(20).unwrap()[0];
        assert_eq!(rec.face_count, 0);
        assert!(rec.boxes.is_empty());
    }

    #[test]
    fn test_recent_orders_newest_first_and_limits() {
        let (_dir, store) = temp_store();
        store.insert_at(&detection("old.jpg", 1), at(0)).unwrap();
        store.insert_at(&detection("newest.jpg", 1), at(120)).unwrap();
        store.insert_at(&detection("middle.jpg", 1), at(60)).unwrap();

        let names: Vec<String> = store.recent(20).unwrap().into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, ["newest.jpg", "middle.jpg", "old.jpg"]);

        let top = store.recent(2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].file_name, "newest.jpg");

        assert!(store.recent(0).unwrap().is_empty());
    }

    #[test]
    fn test_same_timestamp_breaks_ties_by_id() {
        let (_dir, store) = temp_store();
        let first = store.insert_at(&detection("first.jpg", 0), at(5)).unwrap();
        let second = store.insert_at(&detection("second.jpg", 0), at(5)).unwrap();
        let ids: Vec<i64> = store.recent(5).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, [second.id, first.id]);
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        HistoryStore::open(&path).unwrap().insert(&detection("kept.jpg", 2)).unwrap();
        let store = HistoryStore::open(&path).unwrap();
        assert_eq!(store.recent(1).unwrap()[0].file_name, "kept.jpg");
    }

    #[test]
    fn test_blank_boxes_column_reads_as_empty() {
        let (_dir, store) = temp_store();
        store
            .connect()
            .unwrap()
            .execute(
                "INSERT INTO detection_history (file_name, timestamp, face_count, boxes)
                 VALUES ('legacy.jpg', '2024-01-01T00:00:00.000000Z', 0, '')",
                [],
            )
            .unwrap();
        let rec = &store.recent(1).unwrap()[0];
        assert!(rec.boxes.is_empty());
    }

    #[test]
    fn test_corrupt_boxes_fail_loudly() {
        let (_dir, store) = temp_store();
        store
            .connect()
            .unwrap()
            .execute(
                "INSERT INTO detection_history (file_name, timestamp, face_count, boxes)
                 VALUES ('bad.jpg', '2024-01-01T00:00:00.000000Z', 1, '[{\"x\": 1')",
                [],
            )
            .unwrap();
        assert!(matches!(store.recent(1), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_record_json_shape() {
        let (_dir, store) = temp_store();
        let rec = store.insert_at(&detection("one.jpg", 1), at(0)).unwrap();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20.000000Z");
        assert_eq!(json["boxes"], serde_json::json!([{ "x": 0, "y": 10, "w": 32, "h": 32 }]));
        assert_eq!(json["face_count"], 1);
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        assert!(HistoryStore::open("/nonexistent/dir/history.db").is_err());
    }
}
