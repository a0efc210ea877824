//! The lease data model (§3, §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{InstanceId, WorkerId};

/// One worker's exclusive, time-bounded right to act as leader.
///
/// At most one record per [`WorkerId`] may satisfy `now < expires_at`;
/// stores enforce this as documented on [`LeaseStore::try_acquire`]
/// (defined in `dayrunner-worker`, which owns the trait that operates
/// on this record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub worker_id: WorkerId,
    pub instance_id: InstanceId,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    /// True if this record is still valid at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}
