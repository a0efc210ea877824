//! Stable-ordered pagination over the extracted view (§4.3).

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryRowSource;
#[cfg(feature = "postgres")]
pub use postgres::PgRowSource;

use async_trait::async_trait;
use dayrunner_core::Row;
use thiserror::Error;

/// Errors propagated out of [`RowSource`]; the orchestrator's retry
/// policy (§5) applies uniformly to every variant.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("row source backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// The configured view, read page-by-page in a fixed total order.
///
/// Implementations must expose a total order on a key column: ties in
/// sort key are forbidden, since pagination built on a non-total order
/// may skip or duplicate rows across page boundaries.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Rows `[page * page_size, (page + 1) * page_size)` in the
    /// configured stable order.
    async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<Row>, PageError>;

    /// The current total row count, used to compute `total_pages`.
    async fn total_row_count(&self) -> Result<u64, PageError>;
}

/// Lets a shared `Arc<dyn RowSource>` (or `Arc<ConcreteSource>`) be wrapped
/// in a [`PageReader`], which takes its source by value.
#[async_trait]
impl<T: RowSource + ?Sized> RowSource for std::sync::Arc<T> {
    async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<Row>, PageError> {
        (**self).read_page(page, page_size).await
    }

    async fn total_row_count(&self) -> Result<u64, PageError> {
        (**self).total_row_count().await
    }
}

/// Thin wrapper pairing a [`RowSource`] with a fixed `page_size`,
/// computing `total_pages` as `ceil(total_row_count / page_size)`.
pub struct PageReader<S> {
    source: S,
    page_size: u64,
}

impl<S: RowSource> PageReader<S> {
    #[must_use]
    pub fn new(source: S, page_size: u64) -> Self {
        Self { source, page_size }
    }

    pub async fn total_pages(&self) -> Result<u64, PageError> {
        let total_rows = self.source.total_row_count().await?;
        Ok(total_rows.div_ceil(self.page_size))
    }

    pub async fn read_page(&self, page: u64) -> Result<Vec<Row>, PageError> {
        self.source.read_page(page, self.page_size).await
    }
}
