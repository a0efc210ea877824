//! The per-file progress data model and its monotonic status machine (§3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{FileId, WorkerId};

/// Lifecycle status of one file within a run.
///
/// Ordered so that `status.as_u8()` monotonicity can be asserted
/// directly: `Started < InProgress < Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Started,
    InProgress,
    Completed,
}

impl FileStatus {
    /// True if transitioning from `self` to `next` respects the
    /// `Started -> InProgress -> Completed` invariant (§3). Staying in
    /// place is allowed (idempotent re-assertion of `Started`, repeated
    /// `UpsertProgress` calls while `InProgress`).
    #[must_use]
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        next >= self
    }
}

/// One file's accumulated progress for the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProgress {
    pub file_id: FileId,
    pub worker_id: WorkerId,
    pub status: FileStatus,
    pub last_page: u64,
    pub cumulative_rows: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl FileProgress {
    /// A freshly started record, as produced by `SetStart` on first
    /// observation of a file for a run.
    #[must_use]
    pub fn started(file_id: FileId, worker_id: WorkerId, now: DateTime<Utc>) -> Self {
        Self {
            file_id,
            worker_id,
            status: FileStatus::Started,
            last_page: 0,
            cumulative_rows: 0,
            started_at: now,
            completed_at: None,
        }
    }

    /// True if an `UpsertProgress(page, ...)` call against this record is
    /// allowed to apply: the record must still be able to transition to
    /// `InProgress` (so a `Completed` record can never be walked back), and
    /// `page` must not regress `last_page`. Every `ProgressStore` backend
    /// shares this single check so their monotonicity enforcement can't
    /// drift apart from each other.
    #[must_use]
    pub fn allows_upsert(&self, page: u64) -> bool {
        self.status.can_transition_to(FileStatus::InProgress) && page >= self.last_page
    }
}

/// Raised when a caller attempts to move a [`FileProgress`] backwards
/// through its status machine, or to regress `last_page`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressTransitionError {
    #[error("file {file_id}: cannot move status {from:?} -> {to:?}")]
    StatusRegression {
        file_id: FileId,
        from: FileStatus,
        to: FileStatus,
    },
    #[error("file {file_id}: last_page would regress from {from} to {to}")]
    PageRegression { file_id: FileId, from: u64, to: u64 },
}
