//! Configuration types and defaults (§6).

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{FileId, WorkerId};

/// Top-level configuration for one worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub worker: WorkerIdentityConfig,
    pub bus: BusConfig,
    pub sql: SqlConfig,
    pub files: Vec<FileSpec>,
    pub state_store: StateStoreConfig,
    pub output_root_path: String,
    pub policy: PolicyConfig,
}

impl Config {
    /// Structural validation beyond what the type system enforces:
    /// non-empty identifiers, at least one file, and an `orderBy` that
    /// is plausibly a total order (non-empty column list).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.worker_id.trim().is_empty() {
            return Err(ConfigError::MissingField("worker.workerId"));
        }
        if self.sql.order_by.trim().is_empty() {
            return Err(ConfigError::MissingField("sql.orderBy"));
        }
        if self.sql.key_column.trim().is_empty() {
            return Err(ConfigError::MissingField("sql.keyColumn"));
        }
        if self.sql.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sql.pageSize",
                reason: "must be greater than zero".into(),
            });
        }
        if self.files.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "files",
                reason: "at least one output file must be configured".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for file in &self.files {
            if file.file_id.trim().is_empty() {
                return Err(ConfigError::MissingField("files[].fileId"));
            }
            if !seen.insert(file.file_id.clone()) {
                return Err(ConfigError::InvalidValue {
                    field: "files[].fileId",
                    reason: format!("duplicate file id {}", file.file_id),
                });
            }
        }
        if self.policy.lease_ttl <= self.policy.lease_heartbeat_interval {
            return Err(ConfigError::InvalidValue {
                field: "policy.leaseTtl",
                reason: "must exceed leaseHeartbeatInterval so transient latency is tolerated"
                    .into(),
            });
        }
        Ok(())
    }
}

/// Errors raised by [`Config::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Worker identity (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerIdentityConfig {
    pub worker_id: WorkerId,
}

/// Message bus configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    pub event_type: String,
    pub consumer_group: String,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl BusConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);
}

/// SQL extraction configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    pub connection_string: String,
    pub view_name: String,
    /// Must be a total order (ties in sort key are forbidden, §4.3).
    pub order_by: String,
    pub key_column: String,
    pub page_size: u64,
}

impl SqlConfig {
    pub const DEFAULT_PAGE_SIZE: u64 = 10_000;
}

/// One configured output file (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpec {
    pub file_id: FileId,
    /// May contain the literal substring `"{date}"`, replaced with the
    /// current UTC calendar date as `YYYYMMDD`.
    pub file_name_pattern: String,
    pub translator_id: String,
}

impl FileSpec {
    /// Resolves `file_name_pattern` against a UTC date, substituting
    /// `"{date}"` with `YYYYMMDD`.
    #[must_use]
    pub fn resolve_file_name(&self, date: NaiveDate) -> String {
        self.file_name_pattern
            .replace("{date}", &date.format("%Y%m%d").to_string())
    }

    /// Convenience: resolves against today's UTC date.
    #[must_use]
    pub fn resolve_file_name_today(&self) -> String {
        self.resolve_file_name(Utc::now().date_naive())
    }
}

/// State store configuration (§6) -- the shared backing store for the
/// [`crate::LeaseRecord`] and [`crate::FileProgress`] collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateStoreConfig {
    pub connection_string: String,
    pub database: String,
    pub status_collection: String,
    pub lease_collection: String,
}

/// Timing and retry policy (§5, §6, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(with = "duration_millis")]
    pub lease_heartbeat_interval: Duration,
    #[serde(with = "duration_millis")]
    pub lease_ttl: Duration,
    #[serde(with = "duration_millis")]
    pub takeover_polling_interval: Duration,
    #[serde(with = "duration_millis")]
    pub daily_trigger_window: Duration,
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            lease_heartbeat_interval: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(120),
            takeover_polling_interval: Duration::from_secs(15),
            daily_trigger_window: Duration::from_secs(24 * 3600),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

/// (De)serializes a [`Duration`] as whole milliseconds, matching the
/// `*Ms`/`*Interval` field shapes used throughout §6.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        #[allow(clippy::cast_possible_truncation)]
        (value.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
