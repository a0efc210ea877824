//! The leader's background heartbeat task (§5).
//!
//! Wakes every `lease_heartbeat_interval`, calls `Renew`. On renewal
//! failure it flips `lost`, which the extraction loop's per-page
//! re-check observes and treats identically to a cancellation from
//! above.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dayrunner_core::{InstanceId, WorkerId};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lease::LeaseStore;

/// Shared flag the extraction loop polls to learn it has lost the lease.
#[derive(Clone, Default)]
pub struct LeaseLostFlag(Arc<AtomicBool>);

impl LeaseLostFlag {
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Spawns the heartbeat task. Returns a [`LeaseLostFlag`] the caller
/// polls, and a handle to abort the task on the way to `Releasing`.
pub fn spawn<S>(
    store: Arc<S>,
    worker_id: WorkerId,
    instance_id: InstanceId,
    interval: Duration,
    ttl: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (LeaseLostFlag, JoinHandle<()>)
where
    S: LeaseStore + 'static,
{
    let lost = LeaseLostFlag::default();
    let task_lost = lost.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.renew(&worker_id, &instance_id, ttl).await {
                        Ok(true) => {}
                        Ok(false) | Err(_) => {
                            task_lost.set();
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });

    (lost, handle)
}
