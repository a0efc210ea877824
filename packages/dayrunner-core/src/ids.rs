//! Identifier aliases.
//!
//! Kept as plain `String`s rather than newtypes: every wire format and
//! store schema in the specification (`{workerId}:{fileId}` composite
//! keys, JSON event payloads) treats them as opaque strings, and adding
//! a wrapper type here would only relocate `.to_string()` calls rather
//! than prevent a real mix-up.

/// Stable identity of a workload, e.g. `"LoanWorker"`.
pub type WorkerId = String;

/// Fresh identity generated once per process; distinguishes replicas
/// racing for the same worker lease.
pub type InstanceId = String;

/// Identity of one configured output file within a worker.
pub type FileId = String;

/// Generates a fresh [`InstanceId`].
///
/// Replicas call this exactly once at startup; the id is then held for
/// the lifetime of the process.
#[must_use]
pub fn new_instance_id() -> InstanceId {
    uuid::Uuid::new_v4().to_string()
}
