//! Row/page shapes moving through the pagination and fan-out loop.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single nullable cell value extracted from the view.
///
/// `BTreeMap`-keyed rows and a flat scalar `Value` are sufficient for
/// this specification: translators consume one row at a time and emit
/// one line, so there is no need for the nested array/map variants a
/// general-purpose document value would carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One extracted row: an ordered mapping from column name to value.
///
/// `BTreeMap` gives a stable column order, which matters for
/// translators like `csv_line` that must emit columns consistently.
pub type Row = BTreeMap<String, Value>;

/// One page of extraction results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Zero-based page index.
    pub index: u64,
    /// Rows `[index * page_size, (index + 1) * page_size)` in stable order.
    pub rows: Vec<Row>,
}

impl Page {
    /// Number of rows actually present (may be less than `page_size` on
    /// the last page).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
