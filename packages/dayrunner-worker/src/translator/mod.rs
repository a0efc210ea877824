//! Row-to-line translation, keyed by a configured translator id (§4.5).

pub mod builtins;

use std::collections::HashMap;
use std::sync::Arc;

use dayrunner_core::Row;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("translator {0:?} is not registered")]
    NotRegistered(String),
}

/// A pure function from one extracted row to one output line.
pub trait Translator: Send + Sync {
    /// Translates a single row.
    fn translate(&self, row: &Row) -> String;

    /// Batch form; defaults to per-row application.
    fn translate_batch(&self, rows: &[Row]) -> Vec<String> {
        rows.iter().map(|row| self.translate(row)).collect()
    }
}

impl<F: Fn(&Row) -> String + Send + Sync> Translator for F {
    fn translate(&self, row: &Row) -> String {
        self(row)
    }
}

/// Lookup table from translator id to [`Translator`].
#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    translators: HashMap<String, Arc<dyn Translator>>,
}

impl TranslatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the `csv` and `json` built-ins.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("csv", Arc::new(builtins::csv_line as fn(&Row) -> String));
        registry.register("json", Arc::new(builtins::json_line as fn(&Row) -> String));
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, translator: Arc<dyn Translator>) {
        self.translators.insert(id.into(), translator);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Translator>, TranslateError> {
        self.translators
            .get(id)
            .cloned()
            .ok_or_else(|| TranslateError::NotRegistered(id.to_string()))
    }
}
