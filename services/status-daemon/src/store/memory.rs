//! In-memory record store with fault injection for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facstat_reconcile::{apply_plan, MergePlan, SyncCheckpoint};
use facstat_schedule::{ManualOverride, PersonRecord, Status};
use tokio::sync::RwLock;

use super::{PersonPatch, RecordStore, StoreError, StoreResult};

/// How long a stalled write hangs; far longer than any sensible timeout.
const STALL: Duration = Duration::from_secs(3600);

/// Record store held in memory.
///
/// Writes can be made to fail or hang per person, and listing or merging can
/// be made to fail outright.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, PersonRecord>>,
    checkpoint: RwLock<Option<SyncCheckpoint>>,
    failing_status: Mutex<BTreeSet<String>>,
    stalled_status: Mutex<BTreeSet<String>>,
    failing_override: Mutex<BTreeSet<String>>,
    fail_listing: AtomicBool,
    fail_merges: AtomicBool,
    status_writes: AtomicUsize,
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {what} failure"))
}

fn contains(set: &Mutex<BTreeSet<String>>, id: &str) -> bool {
    set.lock()
        .unwrap_or_else(|e| e.into_inner())
        .contains(id)
}

fn add(set: &Mutex<BTreeSet<String>>, id: &str) {
    set.lock()
        .unwrap_or_else(|e| e.into_inner())
        .insert(id.to_string());
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `records`.
    pub fn with_records(records: impl IntoIterator<Item = PersonRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id.clone(), r)).collect()),
            ..Self::default()
        }
    }

    /// Make status writes for `id` fail.
    pub fn fail_status_writes_for(&self, id: &str) {
        add(&self.failing_status, id);
    }

    /// Make status writes for `id` hang.
    pub fn stall_status_writes_for(&self, id: &str) {
        add(&self.stalled_status, id);
    }

    /// Make override clears for `id` fail.
    pub fn fail_override_clears_for(&self, id: &str) {
        add(&self.failing_override, id);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_merges(&self, fail: bool) {
        self.fail_merges.store(fail, Ordering::SeqCst);
    }

    /// Number of successful status writes so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Snapshot of every stored record.
    pub async fn snapshot(&self) -> BTreeMap<String, PersonRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_all(&self) -> StoreResult<Vec<PersonRecord>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(injected("listing"));
        }
        let mut records: Vec<PersonRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            a.schedule
                .precedence
                .cmp(&b.schedule.precedence)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<PersonRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn insert(&self, record: &PersonRecord) -> StoreResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn upsert(&self, id: &str, patch: &PersonPatch, at: DateTime<Utc>) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| PersonRecord::new(id, at));
        patch.apply_to(record);
        record.updated_at = at;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn set_status(&self, id: &str, status: &Status, at: DateTime<Utc>) -> StoreResult<()> {
        if contains(&self.stalled_status, id) {
            tokio::time::sleep(STALL).await;
        }
        if contains(&self.failing_status, id) {
            return Err(injected("status write"));
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.status = status.clone();
        record.status_updated_at = Some(at);
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_override(&self, id: &str, manual: &ManualOverride) -> StoreResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.manual_override = Some(manual.clone());
        Ok(())
    }

    async fn clear_override(&self, id: &str) -> StoreResult<()> {
        if contains(&self.failing_override, id) {
            return Err(injected("override clear"));
        }
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.manual_override = None;
        }
        Ok(())
    }

    async fn apply_merge(&self, plan: &MergePlan) -> StoreResult<()> {
        if self.fail_merges.load(Ordering::SeqCst) {
            return Err(injected("merge"));
        }
        let mut records = self.records.write().await;
        apply_plan(&mut records, plan);
        Ok(())
    }

    async fn sync_checkpoint(&self) -> StoreResult<Option<SyncCheckpoint>> {
        Ok(self.checkpoint.read().await.clone())
    }

    async fn set_sync_checkpoint(&self, checkpoint: &SyncCheckpoint) -> StoreResult<()> {
        *self.checkpoint.write().await = Some(checkpoint.clone());
        Ok(())
    }
}
