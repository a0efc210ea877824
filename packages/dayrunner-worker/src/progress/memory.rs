//! In-process progress store for tests and single-node dry runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dayrunner_core::{ClockSource, FileId, FileProgress, FileStatus, SystemClock, WorkerId};
use parking_lot::RwLock;

use super::{ProgressError, ProgressStore};

pub struct MemoryProgressStore {
    clock: Arc<dyn ClockSource>,
    records: RwLock<HashMap<FileId, FileProgress>>,
}

impl MemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            clock,
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn set_start(&self, file_id: &FileId, worker_id: &WorkerId) -> Result<(), ProgressError> {
        let now = self.clock.now();
        let mut records = self.records.write();
        match records.get_mut(file_id) {
            None => {
                records.insert(
                    file_id.clone(),
                    FileProgress::started(file_id.clone(), worker_id.clone(), now),
                );
            }
            Some(record) if record.status == FileStatus::Started => {
                record.started_at = now;
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn upsert_progress(
        &self,
        file_id: &FileId,
        page: u64,
        rows: u64,
    ) -> Result<(), ProgressError> {
        let mut records = self.records.write();
        let record = records
            .entry(file_id.clone())
            .or_insert_with(|| FileProgress::started(file_id.clone(), String::new(), self.clock.now()));
        // Shared with PgProgressStore via FileProgress::allows_upsert (§3 invariant):
        // a completed record can't be walked back to InProgress, and last_page never
        // decreases -- a page re-applied during takeover must not regress it.
        if !record.allows_upsert(page) {
            return Ok(());
        }
        record.status = FileStatus::InProgress;
        record.last_page = page;
        record.cumulative_rows = rows;
        Ok(())
    }

    async fn set_completed(&self, file_id: &FileId) -> Result<(), ProgressError> {
        let now = self.clock.now();
        let mut records = self.records.write();
        if let Some(record) = records.get_mut(file_id) {
            record.status = FileStatus::Completed;
            record.completed_at = Some(now);
        }
        Ok(())
    }

    async fn get(&self, file_id: &FileId) -> Result<Option<FileProgress>, ProgressError> {
        Ok(self.records.read().get(file_id).cloned())
    }

    async fn list_by_worker(&self, worker_id: &WorkerId) -> Result<Vec<FileProgress>, ProgressError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| &record.worker_id == worker_id)
            .cloned()
            .collect())
    }

    async fn get_min_outstanding_page(&self, worker_id: &WorkerId) -> Result<u64, ProgressError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|record| &record.worker_id == worker_id && record.status != FileStatus::Completed)
            .map(|record| record.last_page)
            .min()
            .unwrap_or(0))
    }
}
