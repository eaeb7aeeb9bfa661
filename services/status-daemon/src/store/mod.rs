//! Person record storage.
//!
//! The store is the only shared mutable state in the system. Writers stay out
//! of each other's way by touching disjoint columns: reconciliation writes
//! schedule fields, the scheduler writes status, and overrides are written by
//! administrators and cleared by the sweeper. No in-process lock is held
//! across a resolve and its write.

mod memory;
mod sqlite;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facstat_reconcile::{MergePlan, SyncCheckpoint};
use facstat_schedule::{ClassSlot, Interval, ManualOverride, PersonRecord, Status, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("person not found: {0}")]
    NotFound(String),

    #[error("person already exists: {0}")]
    AlreadyExists(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Partial update of a person's schedule fields.
///
/// Absent fields are left as stored. Status and override are never part of a
/// patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPatch {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub weekend_days: Option<BTreeSet<Weekday>>,

    #[serde(default)]
    pub office_hours: Option<BTreeMap<Weekday, Interval>>,

    #[serde(default)]
    pub class_times: Option<BTreeMap<Weekday, Vec<ClassSlot>>>,

    #[serde(default)]
    pub precedence: Option<i32>,
}

impl PersonPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Merge the stated fields onto `record`.
    pub fn apply_to(&self, record: &mut PersonRecord) {
        if let Some(name) = &self.name {
            record.name = Some(name.clone());
        }
        if let Some(days) = &self.weekend_days {
            record.schedule.weekend_days = days.clone();
        }
        if let Some(hours) = &self.office_hours {
            record.schedule.office_hours = hours.clone();
        }
        if let Some(classes) = &self.class_times {
            record.schedule.class_times = classes.clone();
        }
        if let Some(precedence) = self.precedence {
            record.schedule.precedence = precedence;
        }
    }
}

/// Storage for person records and the schedule sync checkpoint.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records, ordered by precedence then id.
    async fn list_all(&self) -> StoreResult<Vec<PersonRecord>>;

    async fn get(&self, id: &str) -> StoreResult<Option<PersonRecord>>;

    /// Add a new person. Fails with [`StoreError::AlreadyExists`] if the id
    /// is taken.
    async fn insert(&self, record: &PersonRecord) -> StoreResult<()>;

    /// Merge schedule fields into a person, creating them if needed.
    async fn upsert(&self, id: &str, patch: &PersonPatch, at: DateTime<Utc>) -> StoreResult<()>;

    /// Remove a person. Returns whether anything was removed.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// Store a freshly computed status.
    async fn set_status(&self, id: &str, status: &Status, at: DateTime<Utc>) -> StoreResult<()>;

    /// Set or replace a person's override.
    async fn set_override(&self, id: &str, manual: &ManualOverride) -> StoreResult<()>;

    /// Clear a person's override. Clearing an absent override or an unknown
    /// person succeeds.
    async fn clear_override(&self, id: &str) -> StoreResult<()>;

    /// Apply a reconciliation plan atomically: every write lands or none do.
    async fn apply_merge(&self, plan: &MergePlan) -> StoreResult<()>;

    async fn sync_checkpoint(&self) -> StoreResult<Option<SyncCheckpoint>>;

    async fn set_sync_checkpoint(&self, checkpoint: &SyncCheckpoint) -> StoreResult<()>;
}

/// Bound a store call by `limit`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
