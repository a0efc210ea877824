//! Postgres-backed [`ProgressStore`].

use async_trait::async_trait;
use dayrunner_core::{FileId, FileProgress, FileStatus, WorkerId};
use sqlx::{PgPool, Row as _};

use super::{ProgressError, ProgressStore};

/// Expected schema (see `state_store` config):
/// ```sql
/// CREATE TABLE file_progress (
///     file_id         TEXT PRIMARY KEY,
///     worker_id       TEXT NOT NULL,
///     status          TEXT NOT NULL,
///     last_page       BIGINT NOT NULL,
///     cumulative_rows BIGINT NOT NULL,
///     started_at      TIMESTAMPTZ NOT NULL,
///     completed_at    TIMESTAMPTZ
/// );
/// ```
pub struct PgProgressStore {
    pool: PgPool,
    table: String,
}

impl PgProgressStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_table(pool, "file_progress")
    }

    #[must_use]
    pub fn with_table(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    fn to_backend_err(err: sqlx::Error) -> ProgressError {
        ProgressError::Backend(err.into())
    }

    fn row_to_progress(row: sqlx::postgres::PgRow) -> FileProgress {
        let status: String = row.get("status");
        FileProgress {
            file_id: row.get("file_id"),
            worker_id: row.get("worker_id"),
            status: match status.as_str() {
                "in_progress" => FileStatus::InProgress,
                "completed" => FileStatus::Completed,
                _ => FileStatus::Started,
            },
            last_page: row.get::<i64, _>("last_page") as u64,
            cumulative_rows: row.get::<i64, _>("cumulative_rows") as u64,
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        }
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn set_start(&self, file_id: &FileId, worker_id: &WorkerId) -> Result<(), ProgressError> {
        let sql = format!(
            "INSERT INTO {table} (file_id, worker_id, status, last_page, cumulative_rows, started_at, completed_at)
             VALUES ($1, $2, 'started', 0, 0, now(), NULL)
             ON CONFLICT (file_id) DO UPDATE
               SET started_at = EXCLUDED.started_at
             WHERE {table}.status = 'started'",
            table = self.table
        );

        sqlx::query(&sql)
            .bind(file_id)
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;
        Ok(())
    }

    async fn upsert_progress(
        &self,
        file_id: &FileId,
        page: u64,
        rows: u64,
    ) -> Result<(), ProgressError> {
        // Mirrors FileProgress::allows_upsert: a completed record can't be walked
        // back to in_progress, and last_page never regresses.
        let sql = format!(
            "INSERT INTO {table} (file_id, worker_id, status, last_page, cumulative_rows, started_at, completed_at)
             VALUES ($1, '', 'in_progress', $2, $3, now(), NULL)
             ON CONFLICT (file_id) DO UPDATE
               SET status = 'in_progress', last_page = $2, cumulative_rows = $3
             WHERE {table}.last_page <= $2 AND {table}.status <> 'completed'",
            table = self.table
        );

        #[allow(clippy::cast_possible_wrap)]
        sqlx::query(&sql)
            .bind(file_id)
            .bind(page as i64)
            .bind(rows as i64)
            .execute(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;
        Ok(())
    }

    async fn set_completed(&self, file_id: &FileId) -> Result<(), ProgressError> {
        let sql = format!(
            "UPDATE {table} SET status = 'completed', completed_at = now() WHERE file_id = $1",
            table = self.table
        );

        sqlx::query(&sql)
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;
        Ok(())
    }

    async fn get(&self, file_id: &FileId) -> Result<Option<FileProgress>, ProgressError> {
        let sql = format!("SELECT * FROM {table} WHERE file_id = $1", table = self.table);

        let row = sqlx::query(&sql)
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(row.map(Self::row_to_progress))
    }

    async fn list_by_worker(&self, worker_id: &WorkerId) -> Result<Vec<FileProgress>, ProgressError> {
        let sql = format!("SELECT * FROM {table} WHERE worker_id = $1", table = self.table);

        let rows = sqlx::query(&sql)
            .bind(worker_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(rows.into_iter().map(Self::row_to_progress).collect())
    }

    async fn get_min_outstanding_page(&self, worker_id: &WorkerId) -> Result<u64, ProgressError> {
        let sql = format!(
            "SELECT COALESCE(MIN(last_page), 0) AS min_page FROM {table}
             WHERE worker_id = $1 AND status <> 'completed'",
            table = self.table
        );

        let row = sqlx::query(&sql)
            .bind(worker_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(row.get::<i64, _>("min_page") as u64)
    }
}
