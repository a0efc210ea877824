//! At-most-once-per-calendar-day gating (§4.7).

use std::sync::Arc;

use async_trait::async_trait;
use dayrunner_core::{ClockSource, FileStatus, WorkerId};

use crate::progress::ProgressError;
use crate::ProgressStore;

/// Decides whether a worker should begin a new run today.
///
/// The default implementation derives its answer from the
/// [`ProgressStore`] rather than keeping separate state: the daily
/// gate blocks a second, independent run only once *every* file started
/// today has completed, but a replica taking over from a crashed leader
/// sees its predecessor's `Started`/`InProgress` records and is allowed
/// through to resume them rather than being shut out by its own takeover.
#[async_trait]
pub trait TriggerGuard: Send + Sync {
    /// False only if every record for `worker_id` whose `started_at`
    /// falls within the current UTC calendar day is `Completed`. A single
    /// completed file does not block the rest -- an in-progress sibling
    /// record from an earlier, now-dead leader must still let the next
    /// leader through to resume it.
    async fn should_process(&self, worker_id: &WorkerId) -> Result<bool, ProgressError>;

    /// Hook invoked after a run completes; may be a no-op when the
    /// decision is entirely derived from the store.
    async fn mark_processed(&self, worker_id: &WorkerId) -> Result<(), ProgressError>;
}

/// Default [`TriggerGuard`]: consults [`ProgressStore::list_by_worker`].
pub struct ProgressBackedTriggerGuard<P> {
    store: P,
    clock: Arc<dyn ClockSource>,
}

impl<P: ProgressStore> ProgressBackedTriggerGuard<P> {
    #[must_use]
    pub fn new(store: P, clock: Arc<dyn ClockSource>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl<P: ProgressStore> TriggerGuard for ProgressBackedTriggerGuard<P> {
    async fn should_process(&self, worker_id: &WorkerId) -> Result<bool, ProgressError> {
        let today = self.clock.today();
        let records = self.store.list_by_worker(worker_id).await?;
        let todays_records: Vec<_> = records
            .iter()
            .filter(|record| record.started_at.date_naive() == today)
            .collect();
        // Every file started today must have finished, not merely one of
        // them -- otherwise a leader that fully completes file A but dies
        // before finalizing file B would leave B permanently stranded: the
        // next leader would see A's `Completed` record and refuse to run
        // at all for the rest of the day.
        let already_completed_today =
            !todays_records.is_empty() && todays_records.iter().all(|record| record.status == FileStatus::Completed);
        Ok(!already_completed_today)
    }

    async fn mark_processed(&self, _worker_id: &WorkerId) -> Result<(), ProgressError> {
        Ok(())
    }
}
