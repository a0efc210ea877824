//! The state machine composing every other module (§4.8).
//!
//! States of one replica: `Follower -> Candidate ->
//! Leader{Preparing,Extracting,Finalizing} -> Releasing -> Follower`.

pub mod backoff;
pub mod heartbeat;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dayrunner_core::{ClockSource, Config, FileId, FileStatus, InstanceId, WorkerId};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::lease::{LeaseError, LeaseStore};
use crate::output::{OutputError, OutputWriter};
use crate::paging::{PageError, PageReader, RowSource};
use crate::progress::{ProgressError, ProgressStore};
use crate::publisher::{EventPublisher, PublishError};
use crate::translator::{TranslateError, TranslatorRegistry};
use crate::trigger::TriggerGuard;

/// States of one replica (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    Follower,
    Candidate,
    LeaderPreparing,
    LeaderExtracting,
    LeaderFinalizing,
    Releasing,
}

impl ReplicaState {
    /// Numeric encoding for the `dayrunner_replica_state` gauge.
    #[must_use]
    pub fn as_ordinal(self) -> f64 {
        match self {
            ReplicaState::Follower => 0.0,
            ReplicaState::Candidate => 1.0,
            ReplicaState::LeaderPreparing | ReplicaState::LeaderExtracting | ReplicaState::LeaderFinalizing => 2.0,
            ReplicaState::Releasing => 3.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Lease(#[from] LeaseError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("leadership lost mid-run")]
    LeadershipLost,
}

/// Collaborators the orchestrator depends on, injected at construction
/// (§9: "express each collaborator behind a narrow capability").
pub struct OrchestratorDeps {
    pub lease: Arc<dyn LeaseStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub rows: Arc<dyn RowSource>,
    pub outputs: HashMap<FileId, Arc<dyn OutputWriter>>,
    pub translators: TranslatorRegistry,
    pub publisher: Arc<dyn EventPublisher>,
    pub trigger: Arc<dyn TriggerGuard>,
    pub clock: Arc<dyn ClockSource>,
}

struct FileSpecRuntime {
    file_id: FileId,
    translator_id: String,
}

/// Drives one worker replica through its leadership lifecycle.
pub struct Orchestrator {
    worker_id: WorkerId,
    instance_id: InstanceId,
    deps: OrchestratorDeps,
    files: Vec<FileSpecRuntime>,
    event_type: String,
    page_size: u64,
    lease_ttl: Duration,
    lease_heartbeat_interval: Duration,
    takeover_polling_interval: Duration,
    max_retries: u32,
    initial_backoff: Duration,
    backoff_multiplier: f64,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: &Config, deps: OrchestratorDeps) -> Self {
        let files = config
            .files
            .iter()
            .map(|spec| FileSpecRuntime {
                file_id: spec.file_id.clone(),
                translator_id: spec.translator_id.clone(),
            })
            .collect();

        Self {
            worker_id: config.worker.worker_id.clone(),
            instance_id: dayrunner_core::new_instance_id(),
            deps,
            files,
            event_type: config.bus.event_type.clone(),
            page_size: config.sql.page_size,
            lease_ttl: config.policy.lease_ttl,
            lease_heartbeat_interval: config.policy.lease_heartbeat_interval,
            takeover_polling_interval: config.policy.takeover_polling_interval,
            max_retries: config.policy.max_retries,
            initial_backoff: config.policy.initial_backoff,
            backoff_multiplier: config.policy.backoff_multiplier,
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    async fn retry<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        backoff::retry(self.max_retries, self.initial_backoff, self.backoff_multiplier, op).await
    }

    /// Runs the `Follower -> ... -> Releasing` loop until `shutdown`
    /// fires.
    pub async fn run_forever(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                () = tokio::time::sleep(self.takeover_polling_interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }

            if *shutdown.borrow() {
                return;
            }

            if let Err(err) = self.run_once(shutdown.clone()).await {
                warn!(worker_id = %self.worker_id, instance_id = %self.instance_id, error = %err, "run cycle failed");
            }
        }
    }

    /// Attempts to become leader once; if successful, drives the full
    /// Preparing/Extracting/Finalizing/Releasing sequence to
    /// completion before returning. Intended for tests and `--once`.
    pub async fn run_once(&self, shutdown: watch::Receiver<bool>) -> Result<ReplicaState, OrchestratorError> {
        crate::metrics::record_replica_state(ReplicaState::Candidate.as_ordinal());
        let acquired = self
            .deps
            .lease
            .try_acquire(&self.worker_id, &self.instance_id, self.lease_ttl)
            .await?;

        if !acquired {
            crate::metrics::record_replica_state(ReplicaState::Follower.as_ordinal());
            return Ok(ReplicaState::Follower);
        }
        crate::metrics::record_lease_acquired();

        let result = self.lead(shutdown).await;

        let release_result = self.deps.lease.release(&self.worker_id, &self.instance_id).await;
        crate::metrics::record_replica_state(ReplicaState::Follower.as_ordinal());
        release_result?;

        result?;
        Ok(ReplicaState::Releasing)
    }

    async fn lead(&self, shutdown: watch::Receiver<bool>) -> Result<(), OrchestratorError> {
        crate::metrics::record_replica_state(ReplicaState::LeaderPreparing.as_ordinal());
        let should_process = self.deps.trigger.should_process(&self.worker_id).await?;
        if !should_process {
            info!(worker_id = %self.worker_id, "already processed today, releasing");
            return Ok(());
        }

        for file in &self.files {
            self.deps.progress.set_start(&file.file_id, &self.worker_id).await?;
        }

        let (lost, heartbeat) = heartbeat::spawn(
            self.deps.lease.clone(),
            self.worker_id.clone(),
            self.instance_id.clone(),
            self.lease_heartbeat_interval,
            self.lease_ttl,
            shutdown,
        );

        let extraction_result = self.extract(&lost).await;
        heartbeat.abort();

        extraction_result?;

        if lost.is_lost() {
            crate::metrics::record_lease_lost();
            return Err(OrchestratorError::LeadershipLost);
        }

        crate::metrics::record_replica_state(ReplicaState::LeaderFinalizing.as_ordinal());
        self.finalize().await?;

        self.deps.trigger.mark_processed(&self.worker_id).await?;
        Ok(())
    }

    async fn extract(&self, lost: &heartbeat::LeaseLostFlag) -> Result<(), OrchestratorError> {
        crate::metrics::record_replica_state(ReplicaState::LeaderExtracting.as_ordinal());
        let resume_page = self.deps.progress.get_min_outstanding_page(&self.worker_id).await?;
        let reader = PageReader::new(self.deps.rows.clone(), self.page_size.max(1));
        let total_pages = self.retry(|| reader.total_pages()).await?;

        for page in resume_page..total_pages {
            if lost.is_lost() {
                return Err(OrchestratorError::LeadershipLost);
            }
            if !self.confirm_leadership().await? {
                return Err(OrchestratorError::LeadershipLost);
            }

            let rows = self.retry(|| reader.read_page(page)).await?;
            if rows.is_empty() {
                break;
            }
            let cumulative_rows = page * self.page_size + rows.len() as u64;

            let tasks = self
                .files
                .iter()
                .map(|file| self.write_page_for_file(file, page, cumulative_rows, &rows));
            let results = futures_util::future::join_all(tasks).await;
            for result in results {
                result?;
            }

            crate::metrics::record_page_processed(&self.worker_id);
        }

        Ok(())
    }

    async fn confirm_leadership(&self) -> Result<bool, OrchestratorError> {
        match self.deps.lease.get(&self.worker_id).await? {
            Some(record) => Ok(record.instance_id == self.instance_id),
            None => Ok(false),
        }
    }

    async fn write_page_for_file(
        &self,
        file: &FileSpecRuntime,
        page: u64,
        cumulative_rows: u64,
        rows: &[dayrunner_core::Row],
    ) -> Result<(), OrchestratorError> {
        if let Some(existing) = self.deps.progress.get(&file.file_id).await? {
            if existing.status == FileStatus::Completed && existing.last_page >= page {
                return Ok(());
            }
        }

        let translator = self.deps.translators.get(&file.translator_id)?;
        let lines = translator.translate_batch(rows);

        let writer = self
            .deps
            .outputs
            .get(&file.file_id)
            .expect("every configured file has a registered OutputWriter");

        self.retry(|| writer.append_page(page, cumulative_rows, &lines)).await?;
        self.deps.progress.upsert_progress(&file.file_id, page, cumulative_rows).await?;
        Ok(())
    }

    async fn finalize(&self) -> Result<(), OrchestratorError> {
        for file in &self.files {
            if let Some(existing) = self.deps.progress.get(&file.file_id).await? {
                if existing.status == FileStatus::Completed {
                    continue;
                }
            }

            let writer = self
                .deps
                .outputs
                .get(&file.file_id)
                .expect("every configured file has a registered OutputWriter");

            self.retry(|| writer.remove_footer()).await?;
            self.deps.progress.set_completed(&file.file_id).await?;

            let total_rows = self
                .deps
                .progress
                .get(&file.file_id)
                .await?
                .map(|p| p.cumulative_rows)
                .unwrap_or(0);

            self.retry(|| {
                self.deps
                    .publisher
                    .publish_completed(&self.worker_id, &file.file_id, &self.event_type, total_rows)
            })
            .await?;

            crate::metrics::record_file_completed(&file.file_id);
            crate::metrics::record_event_published();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use dayrunner_core::{FixedClock, Row, Value};
    use tempfile::tempdir;

    use crate::lease::{LeaseInfo, MemoryLeaseStore};
    use crate::output::FileOutputWriter;
    use crate::paging::MemoryRowSource;
    use crate::progress::MemoryProgressStore;
    use crate::publisher::bus::InMemoryBusClient;
    use crate::publisher::DefaultEventPublisher;
    use crate::trigger::ProgressBackedTriggerGuard;

    fn sample_row(id: i64) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(id));
        row
    }

    fn sample_config(files: &[&str], page_size: u64) -> Config {
        Config {
            worker: dayrunner_core::WorkerIdentityConfig {
                worker_id: "LoanWorker".into(),
            },
            bus: dayrunner_core::BusConfig {
                bootstrap_servers: "localhost:9092".into(),
                topic: "loan-events".into(),
                event_type: "loan.file.completed".into(),
                consumer_group: "loan-worker".into(),
                timeout: dayrunner_core::BusConfig::DEFAULT_TIMEOUT,
            },
            sql: dayrunner_core::SqlConfig {
                connection_string: "postgres://localhost/loans".into(),
                view_name: "v_loans".into(),
                order_by: "id".into(),
                key_column: "id".into(),
                page_size,
            },
            files: files
                .iter()
                .map(|id| dayrunner_core::FileSpec {
                    file_id: (*id).to_string(),
                    file_name_pattern: format!("{id}_{{date}}.csv"),
                    translator_id: "csv".into(),
                })
                .collect(),
            state_store: dayrunner_core::StateStoreConfig {
                connection_string: "postgres://localhost/state".into(),
                database: "loan_worker".into(),
                status_collection: "file_progress".into(),
                lease_collection: "leases".into(),
            },
            output_root_path: "/tmp".into(),
            policy: dayrunner_core::PolicyConfig {
                lease_heartbeat_interval: Duration::from_millis(10),
                lease_ttl: Duration::from_millis(500),
                takeover_polling_interval: Duration::from_millis(10),
                daily_trigger_window: Duration::from_secs(86_400),
                max_retries: 2,
                initial_backoff: Duration::from_millis(1),
                backoff_multiplier: 2.0,
            },
        }
    }

    fn fresh_deps(
        clock: Arc<FixedClock>,
        rows: Arc<dyn RowSource>,
        progress: Arc<MemoryProgressStore>,
        outputs: HashMap<FileId, Arc<dyn OutputWriter>>,
        bus: InMemoryBusClient,
    ) -> OrchestratorDeps {
        let progress: Arc<dyn ProgressStore> = progress;
        OrchestratorDeps {
            lease: Arc::new(MemoryLeaseStore::with_clock(clock.clone())),
            progress: progress.clone(),
            rows,
            outputs,
            translators: TranslatorRegistry::with_builtins(),
            publisher: Arc::new(DefaultEventPublisher::new(bus, "loan-events", clock.clone())),
            trigger: Arc::new(ProgressBackedTriggerGuard::new(progress, clock.clone())),
            clock,
        }
    }

    /// Wraps a [`RowSource`] to count `read_page` invocations, for the
    /// shared-page scenario's "the reader is consulted once per page,
    /// not once per file" assertion.
    struct CountingRowSource {
        inner: MemoryRowSource,
        reads: Arc<AtomicU64>,
    }

    #[async_trait]
    impl RowSource for CountingRowSource {
        async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<Row>, PageError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_page(page, page_size).await
        }

        async fn total_row_count(&self) -> Result<u64, PageError> {
            self.inner.total_row_count().await
        }
    }

    /// [`LeaseStore`] that delegates everything except `renew`, which
    /// always fails -- simulating a fault injector downstream of the
    /// real lease backend.
    struct FaultyLeaseStore {
        inner: Arc<MemoryLeaseStore>,
    }

    #[async_trait]
    impl LeaseStore for FaultyLeaseStore {
        async fn try_acquire(&self, worker_id: &WorkerId, instance_id: &InstanceId, ttl: Duration) -> Result<bool, LeaseError> {
            self.inner.try_acquire(worker_id, instance_id, ttl).await
        }

        async fn renew(&self, _worker_id: &WorkerId, _instance_id: &InstanceId, _ttl: Duration) -> Result<bool, LeaseError> {
            Ok(false)
        }

        async fn release(&self, worker_id: &WorkerId, instance_id: &InstanceId) -> Result<(), LeaseError> {
            self.inner.release(worker_id, instance_id).await
        }

        async fn is_expired_or_unheld(&self, worker_id: &WorkerId) -> Result<bool, LeaseError> {
            self.inner.is_expired_or_unheld(worker_id).await
        }

        async fn get(&self, worker_id: &WorkerId) -> Result<Option<LeaseInfo>, LeaseError> {
            self.inner.get(worker_id).await
        }
    }

    /// Delays each page read, to stretch extraction over enough wall
    /// time for a concurrently ticking heartbeat to fail mid-run.
    struct SlowRowSource {
        inner: MemoryRowSource,
    }

    #[async_trait]
    impl RowSource for SlowRowSource {
        async fn read_page(&self, page: u64, page_size: u64) -> Result<Vec<Row>, PageError> {
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.inner.read_page(page, page_size).await
        }

        async fn total_row_count(&self) -> Result<u64, PageError> {
            self.inner.total_row_count().await
        }
    }

    // S2: Shared page. Three files, one 3-row page; the page reader is
    // consulted once, not once per file, and every file lands on the
    // same last_page/cumulative_rows.
    #[tokio::test]
    async fn shared_page_is_read_once_and_applied_to_every_file() {
        let config = sample_config(&["A", "B", "C"], 3);
        let clock = Arc::new(FixedClock::at(chrono::Utc::now()));
        let progress = Arc::new(MemoryProgressStore::with_clock(clock.clone()));
        let reads = Arc::new(AtomicU64::new(0));
        let rows: Arc<dyn RowSource> = Arc::new(CountingRowSource {
            inner: MemoryRowSource::new((1..=5).map(sample_row).collect()),
            reads: reads.clone(),
        });

        let dir = tempdir().unwrap();
        let mut outputs: HashMap<FileId, Arc<dyn OutputWriter>> = HashMap::new();
        for file in ["A", "B", "C"] {
            outputs.insert(
                file.to_string(),
                Arc::new(FileOutputWriter::new(dir.path().join(format!("{file}.csv")))) as Arc<dyn OutputWriter>,
            );
        }

        let deps = fresh_deps(clock, rows, progress.clone(), outputs, InMemoryBusClient::new());
        let orchestrator = Orchestrator::new(&config, deps);
        orchestrator.extract(&heartbeat::LeaseLostFlag::default()).await.unwrap();

        // 5 rows / page_size 3 = 2 pages; CountingRowSource saw both,
        // not 2 pages * 3 files.
        assert_eq!(reads.load(Ordering::SeqCst), 2);

        for file in ["A", "B", "C"] {
            let record = progress.get(&file.to_string()).await.unwrap().unwrap();
            assert_eq!(record.last_page, 1);
            assert_eq!(record.cumulative_rows, 5);
        }
    }

    // S3: Takeover. A and C finished through page 4; B lags at page 3
    // (the only gap shape the per-page fan-out can produce). A fresh
    // orchestrator resumes from GetMinOutstandingPage without
    // regressing A/C's already-advanced counters or files.
    #[tokio::test]
    async fn takeover_resumes_the_lagging_file_without_regressing_the_others() {
        let config = sample_config(&["A", "B", "C"], 1);
        let clock = Arc::new(FixedClock::at(chrono::Utc::now()));
        let rows: Vec<Row> = (1..=5).map(sample_row).collect();
        let progress = Arc::new(MemoryProgressStore::with_clock(clock.clone()));
        let worker = "LoanWorker".to_string();

        let dir = tempdir().unwrap();
        let mut writers: HashMap<&str, Arc<FileOutputWriter>> = HashMap::new();
        let mut outputs: HashMap<FileId, Arc<dyn OutputWriter>> = HashMap::new();
        for file in ["A", "B", "C"] {
            let writer = Arc::new(FileOutputWriter::new(dir.path().join(format!("{file}.csv"))));
            outputs.insert(file.to_string(), writer.clone() as Arc<dyn OutputWriter>);
            writers.insert(file, writer);
        }

        for file in ["A", "B", "C"] {
            progress.set_start(&file.to_string(), &worker).await.unwrap();
        }

        // Dead leader wrote pages 0..=4 for A and C, but only 0..=3 for B.
        for page in 0..=4u64 {
            let line = (page + 1).to_string();
            writers.get("A").unwrap().append_page(page, page + 1, &[line.clone()]).await.unwrap();
            writers.get("C").unwrap().append_page(page, page + 1, &[line]).await.unwrap();
        }
        progress.upsert_progress(&"A".to_string(), 4, 5).await.unwrap();
        progress.upsert_progress(&"C".to_string(), 4, 5).await.unwrap();

        for page in 0..=3u64 {
            let line = (page + 1).to_string();
            writers.get("B").unwrap().append_page(page, page + 1, &[line]).await.unwrap();
        }
        progress.upsert_progress(&"B".to_string(), 3, 4).await.unwrap();

        assert_eq!(progress.get_min_outstanding_page(&worker).await.unwrap(), 3);

        let rows: Arc<dyn RowSource> = Arc::new(MemoryRowSource::new(rows));
        let deps = fresh_deps(clock, rows, progress.clone(), outputs, InMemoryBusClient::new());
        let orchestrator = Orchestrator::new(&config, deps);
        orchestrator.extract(&heartbeat::LeaseLostFlag::default()).await.unwrap();

        for file in ["A", "B", "C"] {
            let record = progress.get(&file.to_string()).await.unwrap().unwrap();
            assert_eq!(record.last_page, 4, "{file} must land on the final page");
            assert_eq!(record.cumulative_rows, 5, "{file} must not regress");
        }
        assert_eq!(FileOutputWriter::read_footer(&dir.path().join("B.csv")), (4, 5));

        for file in ["A", "B", "C"] {
            let content = std::fs::read_to_string(dir.path().join(format!("{file}.csv"))).unwrap();
            assert_eq!(content, "1\n2\n3\n4\n5\n4,5\n", "{file} must have exactly one row per page, no duplicates");
        }
    }

    // S4: Skip duplicate. A stale AppendPage for a page the file has
    // already completed past must not touch the writer or the store.
    #[tokio::test]
    async fn write_page_for_file_skips_a_completed_file_already_past_the_page() {
        let config = sample_config(&["A"], 1);
        let clock = Arc::new(FixedClock::at(chrono::Utc::now()));
        let progress = Arc::new(MemoryProgressStore::with_clock(clock.clone()));
        progress.set_start(&"A".to_string(), &"LoanWorker".to_string()).await.unwrap();
        progress.upsert_progress(&"A".to_string(), 10, 100_000).await.unwrap();
        progress.set_completed(&"A".to_string()).await.unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("A.csv");
        let mut outputs: HashMap<FileId, Arc<dyn OutputWriter>> = HashMap::new();
        outputs.insert("A".to_string(), Arc::new(FileOutputWriter::new(&path)) as Arc<dyn OutputWriter>);

        let rows: Arc<dyn RowSource> = Arc::new(MemoryRowSource::new(Vec::new()));
        let deps = fresh_deps(clock, rows, progress.clone(), outputs, InMemoryBusClient::new());
        let orchestrator = Orchestrator::new(&config, deps);

        orchestrator
            .write_page_for_file(&orchestrator.files[0], 9, 90, &[sample_row(1)])
            .await
            .unwrap();

        let record = progress.get(&"A".to_string()).await.unwrap().unwrap();
        assert_eq!(record.last_page, 10);
        assert_eq!(record.cumulative_rows, 100_000);
        assert!(!path.exists(), "writer must not be invoked for a page the file is already past");
    }

    // S5: Finalization. Every file's marker is removed, the progress
    // record is marked Completed, and exactly one completion event is
    // published per file with the right totalRows.
    #[tokio::test]
    async fn finalization_removes_markers_marks_completed_and_publishes_once_per_file() {
        let config = sample_config(&["A", "B"], 2);
        let clock = Arc::new(FixedClock::at(chrono::Utc::now()));
        let rows: Vec<Row> = (1..=3).map(sample_row).collect();
        let progress = Arc::new(MemoryProgressStore::with_clock(clock.clone()));

        let dir = tempdir().unwrap();
        let mut outputs: HashMap<FileId, Arc<dyn OutputWriter>> = HashMap::new();
        for file in ["A", "B"] {
            outputs.insert(
                file.to_string(),
                Arc::new(FileOutputWriter::new(dir.path().join(format!("{file}.csv")))) as Arc<dyn OutputWriter>,
            );
        }

        let bus = InMemoryBusClient::new();
        let rows: Arc<dyn RowSource> = Arc::new(MemoryRowSource::new(rows));
        let deps = fresh_deps(clock, rows, progress.clone(), outputs, bus.clone());
        let orchestrator = Orchestrator::new(&config, deps);

        let (_tx, rx) = watch::channel(false);
        orchestrator.run_once(rx).await.unwrap();

        for file in ["A", "B"] {
            let record = progress.get(&file.to_string()).await.unwrap().unwrap();
            assert_eq!(record.status, FileStatus::Completed);
            assert!(record.completed_at.is_some());

            let content = std::fs::read_to_string(dir.path().join(format!("{file}.csv"))).unwrap();
            let last_line = content.lines().last().unwrap();
            assert!(!last_line.contains(','), "marker must be removed after finalization");
            assert_eq!(content.lines().count(), 3, "only the 3 data rows remain");
        }

        let published = bus.published();
        assert_eq!(published.len(), 2, "one completion event per file");
        for (_, _, event) in &published {
            assert_eq!(event.total_rows, 3);
        }
    }

    // S6: Heartbeat loss. Renew fails from the first tick; extraction
    // must stop before finishing all pages and the lease must be
    // released.
    #[tokio::test]
    async fn heartbeat_loss_stops_extraction_and_releases_the_lease() {
        let mut config = sample_config(&["A"], 1);
        config.policy.lease_heartbeat_interval = Duration::from_millis(5);
        config.policy.lease_ttl = Duration::from_millis(500);
        let clock = Arc::new(FixedClock::at(chrono::Utc::now()));
        let rows: Vec<Row> = (1..=10).map(sample_row).collect();
        let progress = Arc::new(MemoryProgressStore::with_clock(clock.clone()));

        let dir = tempdir().unwrap();
        let mut outputs: HashMap<FileId, Arc<dyn OutputWriter>> = HashMap::new();
        outputs.insert(
            "A".to_string(),
            Arc::new(FileOutputWriter::new(dir.path().join("A.csv"))) as Arc<dyn OutputWriter>,
        );

        let inner_lease = Arc::new(MemoryLeaseStore::with_clock(clock.clone()));
        let lease: Arc<dyn LeaseStore> = Arc::new(FaultyLeaseStore { inner: inner_lease.clone() });
        let rows: Arc<dyn RowSource> = Arc::new(SlowRowSource {
            inner: MemoryRowSource::new(rows),
        });

        let shared_progress: Arc<dyn ProgressStore> = progress.clone();
        let deps = OrchestratorDeps {
            lease,
            progress: shared_progress.clone(),
            rows,
            outputs,
            translators: TranslatorRegistry::with_builtins(),
            publisher: Arc::new(DefaultEventPublisher::new(InMemoryBusClient::new(), "loan-events", clock.clone())),
            trigger: Arc::new(ProgressBackedTriggerGuard::new(shared_progress, clock.clone())),
            clock: clock.clone(),
        };

        let orchestrator = Orchestrator::new(&config, deps);
        let (_tx, rx) = watch::channel(false);
        let result = orchestrator.run_once(rx).await;

        assert!(matches!(result, Err(OrchestratorError::LeadershipLost)));

        if let Some(record) = progress.get(&"A".to_string()).await.unwrap() {
            assert!(record.last_page < 9, "extraction must stop before the final page");
        }

        assert!(inner_lease.is_expired_or_unheld(&"LoanWorker".to_string()).await.unwrap());
    }
}
