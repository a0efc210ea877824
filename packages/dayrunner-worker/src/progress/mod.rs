//! Per-file status and page/row counters, upsert-shaped and idempotent (§4.2).

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryProgressStore;
#[cfg(feature = "postgres")]
pub use postgres::PgProgressStore;

use async_trait::async_trait;
use dayrunner_core::{FileId, FileProgress, WorkerId};
use thiserror::Error;

/// Errors surfaced by a [`ProgressStore`] implementation.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress store backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Durable record of each configured file's processing status for the
/// current run.
///
/// All mutating operations are upserts: calling them twice with the
/// same arguments is a no-op on the second call, which is what lets
/// the orchestrator re-run a page after a crash without corrupting
/// state (§4.8).
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Creates the record with `status = Started` on first observation
    /// of `file_id` for the current run. On an existing record,
    /// re-asserts `Started` only if the record has not yet advanced
    /// past it; otherwise a no-op.
    async fn set_start(&self, file_id: &FileId, worker_id: &WorkerId) -> Result<(), ProgressError>;

    /// Sets `status = InProgress`, `last_page = page`,
    /// `cumulative_rows = rows`. Callers are responsible for ensuring
    /// `page` does not regress (§4.8); implementations are free to
    /// reject a regression rather than silently accept it.
    async fn upsert_progress(
        &self,
        file_id: &FileId,
        page: u64,
        rows: u64,
    ) -> Result<(), ProgressError>;

    /// Sets `status = Completed`, `completed_at = now`.
    async fn set_completed(&self, file_id: &FileId) -> Result<(), ProgressError>;

    /// Reads the current record for `file_id`, if any.
    async fn get(&self, file_id: &FileId) -> Result<Option<FileProgress>, ProgressError>;

    /// All records owned by `worker_id` in the current run.
    async fn list_by_worker(&self, worker_id: &WorkerId) -> Result<Vec<FileProgress>, ProgressError>;

    /// `min(last_page)` over records with `status != Completed`; `0` if
    /// none are outstanding. This is the page extraction resumes at.
    async fn get_min_outstanding_page(&self, worker_id: &WorkerId) -> Result<u64, ProgressError>;
}

/// Lets a shared `Arc<dyn ProgressStore>` (or `Arc<ConcreteStore>`) be
/// handed to collaborators that are generic over `P: ProgressStore`,
/// such as [`crate::trigger::ProgressBackedTriggerGuard`], without
/// those collaborators opening a second, disconnected store instance.
#[async_trait]
impl<T: ProgressStore + ?Sized> ProgressStore for std::sync::Arc<T> {
    async fn set_start(&self, file_id: &FileId, worker_id: &WorkerId) -> Result<(), ProgressError> {
        (**self).set_start(file_id, worker_id).await
    }

    async fn upsert_progress(&self, file_id: &FileId, page: u64, rows: u64) -> Result<(), ProgressError> {
        (**self).upsert_progress(file_id, page, rows).await
    }

    async fn set_completed(&self, file_id: &FileId) -> Result<(), ProgressError> {
        (**self).set_completed(file_id).await
    }

    async fn get(&self, file_id: &FileId) -> Result<Option<FileProgress>, ProgressError> {
        (**self).get(file_id).await
    }

    async fn list_by_worker(&self, worker_id: &WorkerId) -> Result<Vec<FileProgress>, ProgressError> {
        (**self).list_by_worker(worker_id).await
    }

    async fn get_min_outstanding_page(&self, worker_id: &WorkerId) -> Result<u64, ProgressError> {
        (**self).get_min_outstanding_page(worker_id).await
    }
}
