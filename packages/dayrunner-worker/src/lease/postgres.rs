//! Postgres-backed [`LeaseStore`], shared across all replicas of a worker.
//!
//! The conditional-UPDATE-then-check-rows-affected shape below follows
//! the claim/heartbeat/release statements in a job-queue store reused
//! elsewhere in this codebase's reference material: an UPSERT to win a
//! vacant or expired row, and an `UPDATE ... WHERE instance_id = $2`
//! that only a current holder's renew/release can affect.

use std::time::Duration;

use async_trait::async_trait;
use dayrunner_core::{InstanceId, LeaseRecord, WorkerId};
use sqlx::{PgPool, Row as _};

use super::{LeaseError, LeaseInfo, LeaseStore};

/// [`LeaseStore`] backed by a single Postgres table.
///
/// Expected schema (see `state_store` config):
/// ```sql
/// CREATE TABLE leases (
///     worker_id    TEXT PRIMARY KEY,
///     instance_id  TEXT NOT NULL,
///     acquired_at  TIMESTAMPTZ NOT NULL,
///     expires_at   TIMESTAMPTZ NOT NULL
/// );
/// ```
pub struct PgLeaseStore {
    pool: PgPool,
    table: String,
}

impl PgLeaseStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_table(pool, "leases")
    }

    #[must_use]
    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    fn to_backend_err(err: sqlx::Error) -> LeaseError {
        LeaseError::Backend(err.into())
    }
}

#[async_trait]
impl LeaseStore for PgLeaseStore {
    async fn try_acquire(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> Result<bool, LeaseError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_default();
        let sql = format!(
            "INSERT INTO {table} (worker_id, instance_id, acquired_at, expires_at)
             VALUES ($1, $2, now(), now() + $3::interval)
             ON CONFLICT (worker_id) DO UPDATE
               SET instance_id = EXCLUDED.instance_id,
                   acquired_at = EXCLUDED.acquired_at,
                   expires_at  = EXCLUDED.expires_at
             WHERE {table}.expires_at <= now()
             RETURNING instance_id",
            table = self.table
        );

        let row = sqlx::query(&sql)
            .bind(worker_id)
            .bind(instance_id)
            .bind(ttl)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(match row {
            None => false,
            Some(row) => row.get::<String, _>("instance_id") == *instance_id,
        })
    }

    async fn renew(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
        ttl: Duration,
    ) -> Result<bool, LeaseError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_default();
        let sql = format!(
            "UPDATE {table}
             SET expires_at = now() + $3::interval
             WHERE worker_id = $1 AND instance_id = $2",
            table = self.table
        );

        let result = sqlx::query(&sql)
            .bind(worker_id)
            .bind(instance_id)
            .bind(ttl)
            .execute(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(
        &self,
        worker_id: &WorkerId,
        instance_id: &InstanceId,
    ) -> Result<(), LeaseError> {
        let sql = format!(
            "DELETE FROM {table} WHERE worker_id = $1 AND instance_id = $2",
            table = self.table
        );

        sqlx::query(&sql)
            .bind(worker_id)
            .bind(instance_id)
            .execute(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(())
    }

    async fn is_expired_or_unheld(&self, worker_id: &WorkerId) -> Result<bool, LeaseError> {
        Ok(match self.get(worker_id).await? {
            None => true,
            Some(record) => !record.is_live(chrono::Utc::now()),
        })
    }

    async fn get(&self, worker_id: &WorkerId) -> Result<Option<LeaseInfo>, LeaseError> {
        let sql = format!(
            "SELECT worker_id, instance_id, acquired_at, expires_at
             FROM {table} WHERE worker_id = $1",
            table = self.table
        );

        let row = sqlx::query(&sql)
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(row.map(|row| LeaseRecord {
            worker_id: row.get("worker_id"),
            instance_id: row.get("instance_id"),
            acquired_at: row.get("acquired_at"),
            expires_at: row.get("expires_at"),
        }))
    }
}
