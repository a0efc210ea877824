//! Process-wide counters and gauges, exported via the Prometheus
//! exporter wired up in `bin/dayrunner.rs`.

use metrics::{counter, gauge, histogram};

pub const LEASE_ACQUIRED_TOTAL: &str = "dayrunner_lease_acquired_total";
pub const LEASE_LOST_TOTAL: &str = "dayrunner_lease_lost_total";
pub const PAGES_PROCESSED_TOTAL: &str = "dayrunner_pages_processed_total";
pub const FILES_COMPLETED_TOTAL: &str = "dayrunner_files_completed_total";
pub const FILE_WRITE_FAILURES_TOTAL: &str = "dayrunner_file_write_failures_total";
pub const EVENTS_PUBLISHED_TOTAL: &str = "dayrunner_events_published_total";
pub const REPLICA_STATE: &str = "dayrunner_replica_state";
pub const PAGE_LATENCY_SECONDS: &str = "dayrunner_page_latency_seconds";

pub fn record_lease_acquired() {
    counter!(LEASE_ACQUIRED_TOTAL).increment(1);
}

pub fn record_lease_lost() {
    counter!(LEASE_LOST_TOTAL).increment(1);
}

pub fn record_page_processed(worker_id: &str) {
    counter!(PAGES_PROCESSED_TOTAL, "worker_id" => worker_id.to_string()).increment(1);
}

pub fn record_file_completed(file_id: &str) {
    counter!(FILES_COMPLETED_TOTAL, "file_id" => file_id.to_string()).increment(1);
}

pub fn record_file_write_failure(file_id: &str) {
    counter!(FILE_WRITE_FAILURES_TOTAL, "file_id" => file_id.to_string()).increment(1);
}

pub fn record_event_published() {
    counter!(EVENTS_PUBLISHED_TOTAL).increment(1);
}

/// Encodes `ReplicaState` as an integer gauge: Follower=0, Candidate=1,
/// Leader*=2, Releasing=3, matching the ordering leadership transitions
/// move through (§4.8).
pub fn record_replica_state(ordinal: f64) {
    gauge!(REPLICA_STATE).set(ordinal);
}

pub fn record_page_latency(seconds: f64) {
    histogram!(PAGE_LATENCY_SECONDS).record(seconds);
}
