//! Durable, TTL-expiring single-holder mutex keyed by worker identity (§4.1).

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryLeaseStore;
#[cfg(feature = "postgres")]
pub use postgres::PgLeaseStore;

use std::time::Duration;

use async_trait::async_trait;
use dayrunner_core::{InstanceId, LeaseRecord, WorkerId};
use thiserror::Error;

/// Diagnostic read of a worker's lease record.
pub type LeaseInfo = LeaseRecord;

/// Errors surfaced by a [`LeaseStore`] implementation.
///
/// Per §4.1, a *transient* store failure during `try_acquire`/`renew`
/// must not propagate as an error -- implementations swallow it and
/// return `Ok(false)` instead, biasing toward losing leadership rather
/// than falsely claiming it. [`LeaseError`] is reserved for failures
/// the orchestrator cannot safely treat as "not acquired", such as a
/// malformed backend response.
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease store backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Durable, TTL-expiring single-holder mutex keyed by [`WorkerId`].
///
/// Implementations must guarantee that at most one record per
/// `worker_id` satisfies `now < expires_at` at any instant (§3), and
/// must never report `try_acquire`/`renew` as successful unless that
/// invariant genuinely holds after the call.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Atomically acquires the lease if unheld or expired.
    ///
    /// Implementations unable to express this as a single atomic
    /// conditional write perform an upsert followed by a read-back and
    /// return `true` only if the record still names `instance_id`
    /// ("last writer wins, then confirmed by read-back").
    async fn try_acquire(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> Result<bool, LeaseError>;

    /// Conditionally extends `expires_at`, only if `worker_id` and
    /// `instance_id` both still match the stored record.
    async fn renew(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> Result<bool, LeaseError>;

    /// Conditionally deletes the record matching both keys. A missing
    /// record is not an error.
    async fn release(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
    ) -> Result<(), LeaseError>;

    /// True when no record exists, or the existing record has expired.
    async fn is_expired_or_unheld(&self, worker_id: &WorkerId) -> Result<bool, LeaseError>;

    /// Diagnostic read of the current lease record, if any.
    async fn get(&self, worker_id: &WorkerId) -> Result<Option<LeaseInfo>, LeaseError>;
}
