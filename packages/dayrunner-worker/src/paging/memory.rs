//! In-process row source for tests: a fixed `Vec<Row>` sliced by page.

use async_trait::async_trait;
use dayrunner_core::Row;

use super::{PageError, RowSource};

pub struct MemoryRowSource {
    rows: Vec<Row>,
}

impl MemoryRowSource {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<Row>, PageError> {
        let start = (page * page_size) as usize;
        if start >= self.rows.len() {
            return Ok(Vec::new());
        }
        let end = (start + page_size as usize).min(self.rows.len());
        Ok(self.rows[start..end].to_vec())
    }

    async fn total_row_count(&self) -> Result<u64, PageError> {
        Ok(self.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dayrunner_core::Value;

    fn row(id: i64) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(id));
        row
    }

    #[tokio::test]
    async fn read_page_past_the_end_is_empty() {
        let source = MemoryRowSource::new(vec![row(1), row(2)]);
        assert!(source.read_page(5, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_page_slices_by_page_size() {
        let source = MemoryRowSource::new((0..10).map(row).collect());
        let page = source.read_page(1, 4).await.unwrap();
        assert_eq!(page.len(), 4);
        assert_eq!(page[0].get("id"), Some(&Value::Int(4)));
    }
}
