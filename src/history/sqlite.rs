//! SQLite-backed history store
//!
//! One row per record in an append-only `history` table. Triggers reject
//! UPDATE and DELETE, every append runs in its own IMMEDIATE transaction,
//! and the database runs with `synchronous=FULL` so an acknowledged append
//! has reached disk.
//!
//! Timestamps are stored as microseconds since the epoch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use crate::core::identity::{EntityId, IdempotencyKey};
use crate::history::clock::from_micros;
use crate::history::codec::Snapshot;
use crate::history::error::StoreError;
use crate::history::record::HistoryRecord;
use crate::history::store::{AppendRequest, HistoryStore, RecordId, StoredRecord, TimeRange};

/// Current schema version. Unlike a cache, history is never rebuilt, so a
/// mismatch is reported rather than repaired.
const SCHEMA_VERSION: i32 = 2;

const SELECT_COLUMNS: &str = "seq, idempotency_key, entity_id, entity_type, action_name, status, \
     change_type, recorded_at, snapshot, digest";

/// How long a writer waits on another connection's lock before giving up
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable history store in a single SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the history database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path).map_err(map_sqlite_error)?;
        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), "opened history store");
        Ok(store)
    }

    /// Private in-memory database, mainly for tests
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::from_connection(conn, None)
    }

    /// Change how long an append waits on a lock held elsewhere before it
    /// reports the store unavailable
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), StoreError> {
        self.conn.lock().busy_timeout(timeout).map_err(map_sqlite_error)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(map_sqlite_error)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=FULL;",
        )
        .map_err(map_sqlite_error)?;

        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_id TEXT NOT NULL,
                idempotency_key TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                action_name TEXT NOT NULL,
                status TEXT NOT NULL,
                change_type TEXT NOT NULL,
                recorded_at INTEGER NOT NULL,
                snapshot TEXT NOT NULL,
                digest TEXT NOT NULL,
                UNIQUE (entity_id, idempotency_key)
            );
            CREATE INDEX IF NOT EXISTS idx_history_entity ON history(entity_id, seq);

            CREATE TRIGGER IF NOT EXISTS history_no_update BEFORE UPDATE ON history
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;

            CREATE TRIGGER IF NOT EXISTS history_no_delete BEFORE DELETE ON history
            BEGIN
                SELECT RAISE(ABORT, 'history is append-only');
            END;
            "#,
        )
        .map_err(map_sqlite_error)?;

        let version: Option<i32> = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(map_sqlite_error)?;

        match version {
            None => {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )
                .map_err(map_sqlite_error)?;
                Ok(())
            }
            Some(v) if v == SCHEMA_VERSION => Ok(()),
            Some(v) => Err(StoreError::Corrupt(format!(
                "history schema version {} is not supported (expected {})",
                v, SCHEMA_VERSION
            ))),
        }
    }
}

impl HistoryStore for SqliteStore {
    fn append(&self, request: &AppendRequest) -> Result<RecordId, StoreError> {
        let record = &request.record;
        let entity_id = record.entity_id().to_string();
        let key = request.key.to_string();

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite_error)?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT seq FROM history WHERE entity_id = ?1 AND idempotency_key = ?2",
                params![entity_id, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite_error)?;
        if let Some(seq) = existing {
            tracing::debug!(entity = %entity_id, key = %key, seq, "duplicate append ignored");
            return Ok(RecordId::new(seq as u64));
        }

        let last_recorded: Option<i64> = tx
            .query_row(
                "SELECT MAX(recorded_at) FROM history WHERE entity_id = ?1",
                params![entity_id],
                |row| row.get(0),
            )
            .map_err(map_sqlite_error)?;
        let record = record.not_before(last_recorded.and_then(from_micros));

        let snapshot = record.snapshot();
        tx.execute(
            r#"INSERT INTO history (entity_id, idempotency_key, entity_type, action_name, status,
                   change_type, recorded_at, snapshot, digest)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![
                entity_id,
                key,
                snapshot.entity_type(),
                record.action_name(),
                record.status().as_str(),
                record.change_type().as_str(),
                record.timestamp().timestamp_micros(),
                snapshot.canonical_json(),
                snapshot.digest(),
            ],
        )
        .map_err(map_sqlite_error)?;
        let seq = tx.last_insert_rowid();
        tx.commit().map_err(map_sqlite_error)?;

        tracing::debug!(entity = %entity_id, seq, "history record appended");
        Ok(RecordId::new(seq as u64))
    }

    fn fetch_page(
        &self,
        entity_id: &EntityId,
        range: TimeRange,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM history
             WHERE entity_id = ?1 AND seq > ?2 AND recorded_at >= ?3 AND recorded_at <= ?4
             ORDER BY recorded_at ASC, seq ASC
             LIMIT ?5",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_error)?;
        let rows = stmt
            .query_map(
                params![
                    entity_id.to_string(),
                    after.map_or(0, |id| id.sequence() as i64),
                    range.from.map_or(i64::MIN, |t| t.timestamp_micros()),
                    range.to.map_or(i64::MAX, |t| t.timestamp_micros()),
                    limit.min(i64::MAX as usize) as i64,
                ],
                RawRow::from_row,
            )
            .map_err(map_sqlite_error)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(map_sqlite_error)?.into_stored()?);
        }
        Ok(records)
    }

    fn latest(&self, entity_id: &EntityId) -> Result<Option<StoredRecord>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM history WHERE entity_id = ?1 ORDER BY seq DESC LIMIT 1",
            SELECT_COLUMNS
        );
        conn.query_row(&sql, params![entity_id.to_string()], RawRow::from_row)
            .optional()
            .map_err(map_sqlite_error)?
            .map(RawRow::into_stored)
            .transpose()
    }

    fn count(&self, entity_id: &EntityId) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM history WHERE entity_id = ?1",
                params![entity_id.to_string()],
                |row| row.get(0),
            )
            .map_err(map_sqlite_error)?;
        Ok(count as u64)
    }

    fn entities(&self) -> Result<Vec<EntityId>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT DISTINCT entity_id FROM history")
            .map_err(map_sqlite_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(map_sqlite_error)?;

        let mut ids = Vec::new();
        for row in rows {
            let raw = row.map_err(map_sqlite_error)?;
            ids.push(parse_entity_id(&raw)?);
        }
        ids.sort();
        Ok(ids)
    }
}

/// Column values exactly as stored, before any domain validation
struct RawRow {
    seq: i64,
    idempotency_key: String,
    entity_id: String,
    entity_type: String,
    action_name: String,
    status: String,
    change_type: String,
    recorded_at: i64,
    snapshot: String,
    digest: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            idempotency_key: row.get(1)?,
            entity_id: row.get(2)?,
            entity_type: row.get(3)?,
            action_name: row.get(4)?,
            status: row.get(5)?,
            change_type: row.get(6)?,
            recorded_at: row.get(7)?,
            snapshot: row.get(8)?,
            digest: row.get(9)?,
        })
    }

    /// Any row that does not decode means the file was damaged or edited
    /// behind our back.
    fn into_stored(self) -> Result<StoredRecord, StoreError> {
        let corrupt = |what: &str, detail: String| {
            StoreError::Corrupt(format!("row {}: {}: {}", self.seq, what, detail))
        };

        let entity_id = parse_entity_id(&self.entity_id)?;
        let key: IdempotencyKey = self
            .idempotency_key
            .parse()
            .map_err(|e: crate::core::IdParseError| corrupt("idempotency key", e.to_string()))?;
        let body: serde_json::Value = serde_json::from_str(&self.snapshot)
            .map_err(|e| corrupt("snapshot", e.to_string()))?;
        let snapshot = Snapshot::from_stored(entity_id, &self.entity_type, body, &self.digest)
            .map_err(|e| corrupt("snapshot", e.to_string()))?;
        let status = self
            .status
            .parse()
            .map_err(|e: crate::history::ValidationError| corrupt("status", e.to_string()))?;
        let change_type = self
            .change_type
            .parse()
            .map_err(|e: crate::history::ValidationError| corrupt("change type", e.to_string()))?;
        let recorded_at = from_micros(self.recorded_at)
            .ok_or_else(|| corrupt("recorded_at", self.recorded_at.to_string()))?;

        let record = HistoryRecord::with_timestamp(
            snapshot,
            self.action_name.as_str(),
            status,
            change_type,
            recorded_at,
        )
        .map_err(|e| corrupt("record", e.to_string()))?;

        Ok(StoredRecord {
            id: RecordId::new(self.seq as u64),
            idempotency_key: key,
            record,
        })
    }
}

fn parse_entity_id(raw: &str) -> Result<EntityId, StoreError> {
    EntityId::parse(raw).map_err(|e| StoreError::Corrupt(format!("entity id '{}': {}", raw, e)))
}

/// Classify SQLite failures into transient and fatal store errors
fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase | ErrorCode::ConstraintViolation => {
                tracing::error!(error = %err, "history store integrity failure");
                StoreError::Corrupt(err.to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        },
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::IntegralValueOutOfRange(..) => StoreError::Corrupt(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}
