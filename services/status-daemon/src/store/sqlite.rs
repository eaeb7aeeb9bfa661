//! SQLite-based record store.
//!
//! Schedule maps are stored as JSON text columns; timestamps are Unix
//! milliseconds. Each status or override write is a single-row UPDATE that
//! names only its own columns, and a merge plan is applied in one
//! transaction.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facstat_reconcile::{MergePlan, OverrideWrite, PersonWrite, SyncCheckpoint};
use facstat_schedule::{ManualOverride, PersonRecord, Schedule, Status};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{PersonPatch, RecordStore, StoreError, StoreResult};

const PERSON_COLUMNS: &str = "id, name, weekend_days, office_hours, class_times, precedence, \
     manual_override, override_expiry, status, status_room, status_batch, status_updated_at, \
     created_at, updated_at";

/// SQLite record store.
///
/// Cheap to clone; clones share one connection. Queries run on the blocking
/// thread pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // WAL lets the CLI read while the daemon writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        Self::with_connection(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sync_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            marker TEXT,
            synced_at INTEGER
        );

        INSERT OR IGNORE INTO sync_state (id) VALUES (1);

        CREATE TABLE IF NOT EXISTS persons (
            id TEXT PRIMARY KEY,
            name TEXT,
            weekend_days TEXT NOT NULL DEFAULT '[]',
            office_hours TEXT NOT NULL DEFAULT '{}',
            class_times TEXT NOT NULL DEFAULT '{}',
            precedence INTEGER NOT NULL DEFAULT 50,
            manual_override TEXT,
            override_expiry INTEGER,
            status TEXT NOT NULL DEFAULT 'off_duty',
            status_room TEXT,
            status_batch TEXT,
            status_updated_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_persons_precedence ON persons(precedence, id);
        "#,
    )?;

    debug!("Record store schema initialized");
    Ok(())
}

/// A `persons` row before JSON columns are decoded.
struct PersonRow {
    id: String,
    name: Option<String>,
    weekend_days: String,
    office_hours: String,
    class_times: String,
    precedence: i32,
    manual_override: Option<String>,
    override_expiry: Option<i64>,
    status: String,
    status_room: Option<String>,
    status_batch: Option<String>,
    status_updated_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl PersonRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            weekend_days: row.get(2)?,
            office_hours: row.get(3)?,
            class_times: row.get(4)?,
            precedence: row.get(5)?,
            manual_override: row.get(6)?,
            override_expiry: row.get(7)?,
            status: row.get(8)?,
            status_room: row.get(9)?,
            status_batch: row.get(10)?,
            status_updated_at: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_record(self) -> StoreResult<PersonRecord> {
        let id = self.id;
        let timestamp = |ms: i64| {
            DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| StoreError::Corrupt {
                id: id.clone(),
                reason: format!("timestamp out of range: {ms}"),
            })
        };

        let manual_override = match (self.manual_override, self.override_expiry) {
            (Some(status), Some(expiry)) => Some(ManualOverride::new(status, timestamp(expiry)?)),
            // An override without an expiry can never be active; surface it
            // as already expired so the sweeper clears it.
            (Some(status), None) => {
                warn!(person_id = %id, "Override stored without expiry");
                Some(ManualOverride::new(status, DateTime::<Utc>::UNIX_EPOCH))
            }
            (None, Some(_)) => {
                warn!(person_id = %id, "Override expiry stored without status");
                None
            }
            (None, None) => None,
        };

        let schedule = Schedule {
            weekend_days: serde_json::from_str(&self.weekend_days)?,
            office_hours: serde_json::from_str(&self.office_hours)?,
            class_times: serde_json::from_str(&self.class_times)?,
            precedence: self.precedence,
        };

        let status_updated_at = self.status_updated_at.map(timestamp).transpose()?;
        let created_at = timestamp(self.created_at)?;
        let updated_at = timestamp(self.updated_at)?;

        Ok(PersonRecord {
            status: Status::from_parts(&self.status, self.status_room, self.status_batch),
            id,
            name: self.name,
            schedule,
            manual_override,
            status_updated_at,
            created_at,
            updated_at,
        })
    }
}

fn read_one(conn: &Connection, id: &str) -> StoreResult<Option<PersonRecord>> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], PersonRow::from_row)
        .optional()?;
    row.map(PersonRow::into_record).transpose()
}

fn read_all(conn: &Connection) -> StoreResult<Vec<PersonRecord>> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM persons ORDER BY precedence, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], PersonRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(PersonRow::into_record).collect()
}

fn write_new(conn: &Connection, record: &PersonRecord) -> StoreResult<()> {
    let sql = format!(
        "INSERT INTO persons ({PERSON_COLUMNS}) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
    );
    let manual = record.manual_override.as_ref();
    conn.execute(
        &sql,
        params![
            record.id,
            record.name,
            serde_json::to_string(&record.schedule.weekend_days)?,
            serde_json::to_string(&record.schedule.office_hours)?,
            serde_json::to_string(&record.schedule.class_times)?,
            record.schedule.precedence,
            manual.map(|m| m.status.as_str()),
            manual.map(|m| m.expires_at.timestamp_millis()),
            record.status.label(),
            record.status.room(),
            record.status.batch(),
            record.status_updated_at.map(|t| t.timestamp_millis()),
            record.created_at.timestamp_millis(),
            record.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

fn write_schedule(conn: &Connection, record: &PersonRecord) -> StoreResult<usize> {
    let changed = conn.execute(
        r#"
        UPDATE persons SET
            name = ?1,
            weekend_days = ?2,
            office_hours = ?3,
            class_times = ?4,
            precedence = ?5,
            updated_at = ?6
        WHERE id = ?7
        "#,
        params![
            record.name,
            serde_json::to_string(&record.schedule.weekend_days)?,
            serde_json::to_string(&record.schedule.office_hours)?,
            serde_json::to_string(&record.schedule.class_times)?,
            record.schedule.precedence,
            record.updated_at.timestamp_millis(),
            record.id,
        ],
    )?;
    Ok(changed)
}

fn write_override(conn: &Connection, id: &str, manual: Option<&ManualOverride>) -> StoreResult<usize> {
    let changed = conn.execute(
        "UPDATE persons SET manual_override = ?1, override_expiry = ?2 WHERE id = ?3",
        params![
            manual.map(|m| m.status.as_str()),
            manual.map(|m| m.expires_at.timestamp_millis()),
            id,
        ],
    )?;
    Ok(changed)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list_all(&self) -> StoreResult<Vec<PersonRecord>> {
        self.call(|conn| read_all(conn)).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<PersonRecord>> {
        let id = id.to_string();
        self.call(move |conn| read_one(conn, &id)).await
    }

    async fn insert(&self, record: &PersonRecord) -> StoreResult<()> {
        let record = record.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            if read_one(&tx, &record.id)?.is_some() {
                return Err(StoreError::AlreadyExists(record.id));
            }
            write_new(&tx, &record)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn upsert(&self, id: &str, patch: &PersonPatch, at: DateTime<Utc>) -> StoreResult<()> {
        let id = id.to_string();
        let patch = patch.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            match read_one(&tx, &id)? {
                Some(mut record) => {
                    patch.apply_to(&mut record);
                    record.updated_at = at;
                    write_schedule(&tx, &record)?;
                }
                None => {
                    let mut record = PersonRecord::new(id, at);
                    patch.apply_to(&mut record);
                    write_new(&tx, &record)?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            let removed = conn.execute("DELETE FROM persons WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn set_status(&self, id: &str, status: &Status, at: DateTime<Utc>) -> StoreResult<()> {
        let id = id.to_string();
        let status = status.clone();
        self.call(move |conn| {
            let changed = conn.execute(
                r#"
                UPDATE persons SET
                    status = ?1,
                    status_room = ?2,
                    status_batch = ?3,
                    status_updated_at = ?4
                WHERE id = ?5
                "#,
                params![
                    status.label(),
                    status.room(),
                    status.batch(),
                    at.timestamp_millis(),
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn set_override(&self, id: &str, manual: &ManualOverride) -> StoreResult<()> {
        let id = id.to_string();
        let manual = manual.clone();
        self.call(move |conn| {
            if write_override(conn, &id, Some(&manual))? == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn clear_override(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.call(move |conn| {
            write_override(conn, &id, None)?;
            Ok(())
        })
        .await
    }

    async fn apply_merge(&self, plan: &MergePlan) -> StoreResult<()> {
        let plan = plan.clone();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            for write in &plan.writes {
                match write {
                    PersonWrite::Insert(record) => write_new(&tx, record)?,
                    PersonWrite::Update {
                        record,
                        override_write,
                    } => {
                        if write_schedule(&tx, record)? == 0 {
                            // Deleted since the plan was made; abandon the pass.
                            return Err(StoreError::NotFound(record.id.clone()));
                        }
                        match override_write {
                            OverrideWrite::Keep => {}
                            OverrideWrite::Set(manual) => {
                                write_override(&tx, &record.id, Some(manual))?;
                            }
                            OverrideWrite::Clear => {
                                write_override(&tx, &record.id, None)?;
                            }
                        }
                    }
                }
            }
            tx.commit()?;
            debug!(writes = plan.writes.len(), "Merge plan applied");
            Ok(())
        })
        .await
    }

    async fn sync_checkpoint(&self) -> StoreResult<Option<SyncCheckpoint>> {
        self.call(|conn| {
            let (marker, synced_at): (Option<String>, Option<i64>) = conn.query_row(
                "SELECT marker, synced_at FROM sync_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let (Some(marker), Some(synced_at)) = (marker, synced_at) else {
                return Ok(None);
            };
            let synced_at = DateTime::<Utc>::from_timestamp_millis(synced_at).ok_or_else(|| {
                StoreError::Corrupt {
                    id: "sync_state".to_string(),
                    reason: format!("timestamp out of range: {synced_at}"),
                }
            })?;
            Ok(Some(SyncCheckpoint::new(marker, synced_at)))
        })
        .await
    }

    async fn set_sync_checkpoint(&self, checkpoint: &SyncCheckpoint) -> StoreResult<()> {
        let checkpoint = checkpoint.clone();
        self.call(move |conn| {
            conn.execute(
                "UPDATE sync_state SET marker = ?1, synced_at = ?2 WHERE id = 1",
                params![checkpoint.marker, checkpoint.synced_at.timestamp_millis()],
            )?;
            Ok(())
        })
        .await
    }
}
