//! Postgres-backed [`RowSource`] reading a configured view in a fixed
//! `ORDER BY key_column` order.
//!
//! Column values are decoded generically by inspecting each column's
//! Postgres type OID rather than a fixed schema, since the view shape
//! is configuration, not compile-time knowledge.

use async_trait::async_trait;
use dayrunner_core::{Row, Value};
use sqlx::postgres::{PgRow, PgTypeKind};
use sqlx::{Column, PgPool, Row as _, TypeInfo, ValueRef};

use super::{PageError, RowSource};

pub struct PgRowSource {
    pool: PgPool,
    view_name: String,
    order_by: String,
}

impl PgRowSource {
    #[must_use]
    pub fn new(pool: PgPool, view_name: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self {
            pool,
            view_name: view_name.into(),
            order_by: order_by.into(),
        }
    }

    fn to_backend_err(err: sqlx::Error) -> PageError {
        PageError::Backend(err.into())
    }

    fn decode_row(pg_row: &PgRow) -> Row {
        let mut row = Row::new();
        for column in pg_row.columns() {
            let name = column.name().to_string();
            let value = decode_value(pg_row, column.ordinal());
            row.insert(name, value);
        }
        row
    }
}

fn decode_value(pg_row: &PgRow, index: usize) -> Value {
    let raw = match pg_row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }

    let type_info = raw.type_info();
    match type_info.kind() {
        PgTypeKind::Simple => match type_info.name() {
            "BOOL" => pg_row
                .try_get::<bool, _>(index)
                .map(Value::Bool)
                .unwrap_or(Value::Null),
            "INT2" | "INT4" | "INT8" => pg_row
                .try_get::<i64, _>(index)
                .map(Value::Int)
                .unwrap_or(Value::Null),
            "FLOAT4" | "FLOAT8" | "NUMERIC" => pg_row
                .try_get::<f64, _>(index)
                .map(Value::Float)
                .unwrap_or(Value::Null),
            _ => pg_row
                .try_get::<String, _>(index)
                .map(Value::Text)
                .unwrap_or(Value::Null),
        },
        _ => pg_row
            .try_get::<String, _>(index)
            .map(Value::Text)
            .unwrap_or(Value::Null),
    }
}

#[async_trait]
impl RowSource for PgRowSource {
    async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<Row>, PageError> {
        let sql = format!(
            "SELECT * FROM {view} ORDER BY {order_by} LIMIT $1 OFFSET $2",
            view = self.view_name,
            order_by = self.order_by
        );

        #[allow(clippy::cast_possible_wrap)]
        let rows = sqlx::query(&sql)
            .bind(page_size as i64)
            .bind((page * page_size) as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(rows.iter().map(Self::decode_row).collect())
    }

    async fn total_row_count(&self) -> Result<u64, PageError> {
        let sql = format!("SELECT COUNT(*) AS total FROM {view}", view = self.view_name);

        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(Self::to_backend_err)?;

        Ok(row.get::<i64, _>("total") as u64)
    }
}
