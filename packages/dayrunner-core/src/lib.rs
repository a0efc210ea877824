//! `dayrunner` core -- domain types, configuration, and shared primitives.
//!
//! This crate has no I/O of its own. It defines the vocabulary shared
//! between the orchestrator and its collaborators:
//!
//! - **Clock** ([`clock`]): injectable time source, so tests can control
//!   "now" the way the orchestrator's TTL and daily-gate logic does.
//! - **Ids** ([`ids`]): `WorkerId` / `InstanceId` / `FileId` identifiers.
//! - **Value** ([`value`]): the cell value type for extracted rows, and
//!   the `Row` / `Page` shapes the pagination loop moves around.
//! - **Lease** ([`lease`]): the `LeaseRecord` data model.
//! - **Progress** ([`progress`]): the `FileProgress` data model and its
//!   monotonic status machine.
//! - **Event** ([`event`]): the completion event schema and correlation id.
//! - **Config** ([`config`]): every configuration field from the
//!   specification, with the documented defaults.

pub mod clock;
pub mod config;
pub mod event;
pub mod ids;
pub mod lease;
pub mod progress;
pub mod value;

pub use clock::{ClockSource, FixedClock, SystemClock};
pub use config::{
    BusConfig, Config, FileSpec, PolicyConfig, SqlConfig, StateStoreConfig, WorkerIdentityConfig,
};
pub use event::CompletionEvent;
pub use ids::{new_instance_id, FileId, InstanceId, WorkerId};
pub use lease::LeaseRecord;
pub use progress::{FileProgress, FileStatus, ProgressTransitionError};
pub use value::{Page, Row, Value};
