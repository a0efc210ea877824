//! `dayrunner` worker -- the single-writer lease, daily trigger guard,
//! paginated extraction/fan-out loop, crash-resume protocol, and
//! finalization state machine (§1 of the specification).
//!
//! Module map, leaves first:
//!
//! - [`lease`]: durable, TTL-expiring single-holder mutex (§4.1).
//! - [`progress`]: per-file status and page/row counters (§4.2).
//! - [`paging`]: stable-ordered pagination over the extracted view (§4.3).
//! - [`output`]: append-only files with an embedded progress marker (§4.4).
//! - [`translator`]: row -> line translator lookup (§4.5).
//! - [`publisher`]: at-least-once completion event publication (§4.6).
//! - [`trigger`]: at-most-once-per-day gating (§4.7).
//! - [`orchestrator`]: the state machine composing all of the above (§4.8).
//! - [`health`]: readiness/liveness surface (§6).
//! - [`config`]: CLI/env/file configuration loading.
//! - [`metrics`]: process-wide counters.

pub mod config;
pub mod health;
pub mod lease;
pub mod metrics;
pub mod orchestrator;
pub mod output;
pub mod paging;
pub mod progress;
pub mod publisher;
pub mod translator;
pub mod trigger;

pub use lease::{LeaseError, LeaseInfo, LeaseStore};
pub use orchestrator::{Orchestrator, OrchestratorError, ReplicaState};
pub use output::{OutputError, OutputWriter};
pub use paging::{PageError, PageReader, RowSource};
pub use progress::{ProgressError, ProgressStore};
pub use publisher::{EventPublisher, PublishError};
pub use translator::{TranslateError, Translator, TranslatorRegistry};
pub use trigger::TriggerGuard;
