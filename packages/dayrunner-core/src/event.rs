//! The completion event schema (§4.6, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{FileId, WorkerId};

/// `{"workerId":"...","fileId":"...","eventType":"...",
///   "completedAt":"<ISO-8601-UTC>","totalRows":<long>,
///   "correlationId":"<workerId>:<fileId>:<monotonicStamp>"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub worker_id: WorkerId,
    pub file_id: FileId,
    pub event_type: String,
    pub completed_at: DateTime<Utc>,
    pub total_rows: u64,
    pub correlation_id: String,
}

impl CompletionEvent {
    /// Builds a completion event, deriving its correlation id from
    /// `worker_id`, `file_id`, and a caller-supplied monotonic stamp
    /// (typically the completion timestamp's millisecond count, made
    /// unique per publish attempt is not required -- at-least-once
    /// delivery with a stable id is the point, §4.6).
    #[must_use]
    pub fn new(
        worker_id: WorkerId,
        file_id: FileId,
        event_type: String,
        completed_at: DateTime<Utc>,
        total_rows: u64,
        monotonic_stamp: i64,
    ) -> Self {
        let correlation_id = correlation_id(&worker_id, &file_id, monotonic_stamp);
        Self {
            worker_id,
            file_id,
            event_type,
            completed_at,
            total_rows,
            correlation_id,
        }
    }

    /// The bus routing key: `"{workerId}:{fileId}"`.
    #[must_use]
    pub fn bus_key(&self) -> String {
        format!("{}:{}", self.worker_id, self.file_id)
    }
}

/// `"<workerId>:<fileId>:<monotonicStamp>"`.
#[must_use]
pub fn correlation_id(worker_id: &str, file_id: &str, monotonic_stamp: i64) -> String {
    format!("{worker_id}:{file_id}:{monotonic_stamp}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_is_stable_for_same_inputs() {
        assert_eq!(
            correlation_id("LoanWorker", "A", 1700),
            correlation_id("LoanWorker", "A", 1700)
        );
    }

    #[test]
    fn bus_key_matches_worker_colon_file() {
        let event = CompletionEvent::new(
            "LoanWorker".into(),
            "A".into(),
            "loan.file.completed".into(),
            Utc::now(),
            100,
            1700,
        );
        assert_eq!(event.bus_key(), "LoanWorker:A");
        assert_eq!(event.correlation_id, "LoanWorker:A:1700");
    }

    #[test]
    fn event_serializes_with_camel_case_field_names() {
        let event = CompletionEvent::new(
            "LoanWorker".into(),
            "A".into(),
            "loan.file.completed".into(),
            Utc::now(),
            100,
            1700,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("workerId").is_some());
        assert!(json.get("fileId").is_some());
        assert!(json.get("eventType").is_some());
        assert!(json.get("completedAt").is_some());
        assert!(json.get("totalRows").is_some());
        assert!(json.get("correlationId").is_some());
    }
}
