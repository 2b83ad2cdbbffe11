//! Worker liveness registry and its staleness sweep.
//!
//! Workers announce themselves with periodic health reports; a worker whose
//! last report is older than the threshold is dropped on the next sweep.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use indexmap::IndexMap;
use relay_core::WorkerHealth;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(5_000);

/// Default age after which a worker counts as gone.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_millis(10_000);

/// Latest health report per worker id.
#[derive(Debug, Default)]
pub struct LivenessRegistry {
    workers: RwLock<IndexMap<String, WorkerHealth>>,
}

impl LivenessRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the report for `health.worker_id`.
    pub fn record(&self, health: WorkerHealth) {
        self.write().insert(health.worker_id.clone(), health);
    }

    /// The current report for `worker_id`.
    #[must_use]
    pub fn get(&self, worker_id: &str) -> Option<WorkerHealth> {
        self.read().get(worker_id).cloned()
    }

    /// Remove every worker whose report is more than `threshold` older than
    /// `now_millis`. Returns the removed ids.
    pub fn sweep(&self, now_millis: i64, threshold: Duration) -> Vec<String> {
        let threshold_millis = i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX);
        let mut removed = Vec::new();
        self.write().retain(|id, health| {
            if health.is_stale(now_millis, threshold_millis) {
                removed.push(id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// A copy of every live report, in first-seen order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, WorkerHealth> {
        self.read().clone()
    }

    /// Number of tracked workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` when no worker is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<String, WorkerHealth>> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.workers.read().expect("liveness registry read lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<String, WorkerHealth>> {
        #[expect(clippy::expect_used, reason = "lock poisoning is unrecoverable")]
        self.workers.write().expect("liveness registry write lock poisoned")
    }
}

/// Wall clock in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Sweep `registry` every `period`, starting one period from now.
///
/// Never returns; abort the task to stop it.
pub async fn run_sweeper(registry: &LivenessRegistry, period: Duration, threshold: Duration) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        let removed = registry.sweep(now_millis(), threshold);
        tracing::debug!(removed = removed.len(), remaining = registry.len(), "worker sweep");
        for worker_id in removed {
            tracing::info!(%worker_id, "pruned stale worker");
        }
    }
}
