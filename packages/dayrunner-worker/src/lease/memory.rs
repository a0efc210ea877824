//! In-process lease store for tests and single-node dry runs.
//!
//! Mirrors the `RwLock<HashMap<...>>` shape used elsewhere in this
//! codebase for small, contended, in-memory state (e.g. the
//! phi-accrual failure detector's per-node heartbeat table).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use dayrunner_core::{ClockSource, InstanceId, LeaseRecord, SystemClock, WorkerId};
use parking_lot::RwLock;
use std::sync::Arc;

use super::{LeaseError, LeaseInfo, LeaseStore};

/// `LeaseStore` backed by an in-process `HashMap`.
///
/// Not durable across process restarts and not shared across
/// replicas -- intended for tests and single-node dry runs (see
/// `--store-backend memory` on the `dayrunner` binary).
pub struct MemoryLeaseStore {
    clock: Arc<dyn ClockSource>,
    records: RwLock<HashMap<WorkerId, LeaseRecord>>,
}

impl MemoryLeaseStore {
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

impl Default for MemoryLeaseStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn try_acquire(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> Result<bool, LeaseError> {
        let now = self.clock.now();
        let mut records = self.records.write();

        let vacant = match records.get(worker_id) {
            None => true,
            Some(existing) => !existing.is_live(now),
        };
        if !vacant {
            return Ok(false);
        }

        records.insert(
            worker_id.clone(),
            LeaseRecord {
                worker_id: worker_id.clone(),
                instance_id: instance_id.clone(),
                acquired_at: now,
                expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
            },
        );
        Ok(true)
    }

    async fn renew(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> Result<bool, LeaseError> {
        let now = self.clock.now();
        let mut records = self.records.write();
        match records.get_mut(worker_id) {
            Some(record) if &record.instance_id == instance_id => {
                record.expires_at = now + chrono::Duration::from_std(ttl).unwrap_or_default();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
    ) -> Result<(), LeaseError> {
        let mut records = self.records.write();
        if let Some(record) = records.get(worker_id) {
            if &record.instance_id == instance_id {
                records.remove(worker_id);
            }
        }
        Ok(())
    }

    async fn is_expired_or_unheld(&self, worker_id: &WorkerId) -> Result<bool, LeaseError> {
        let now = self.clock.now();
        let records = self.records.read();
        Ok(match records.get(worker_id) {
            None => true,
            Some(record) => !record.is_live(now),
        })
    }

    async fn get(&self, worker_id: &WorkerId) -> Result<Option<LeaseInfo>, LeaseError> {
        Ok(self.records.read().get(worker_id).cloned())
    }
}
