//! The single task that drives reconciliation.
//!
//! # Responsibilities
//! - Fire once per poll interval and run one reconciliation per firing
//! - Publish each resulting snapshot
//! - Drain the pool once shutdown is observed
//!
//! # Design Decisions
//! - The reconciliation runs outside `select!`, so shutdown never cancels it mid-way
//! - Shutdown is checked with priority, so no new tick starts once it is seen
//! - Missed ticks are delayed, not bursted

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::canary::{DrainReport, PoolManager};
use crate::health::snapshot::{HealthSnapshot, SnapshotCell};
use crate::lifecycle::shutdown::ShutdownSignal;

pub struct PollLoop {
    pool: PoolManager,
    cell: Arc<SnapshotCell>,
    interval: Duration,
}

impl PollLoop {
    pub fn new(pool: PoolManager, cell: Arc<SnapshotCell>) -> Self {
        let interval = pool.policy().poll_interval();
        Self {
            pool,
            cell,
            interval,
        }
    }

    /// Run until shutdown, then delete every tracked unit.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> DrainReport {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            namespace = %self.pool.policy().namespace(),
            desired = self.pool.policy().desired_count(),
            "Poll loop starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Poll loop received shutdown signal, draining");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let snapshot = self.pool.reconcile().await;
            self.publish(snapshot);
        }

        self.pool.drain().await
    }

    fn publish(&self, snapshot: HealthSnapshot) {
        let previous = self.cell.load();
        if !previous.same_verdict(&snapshot) {
            tracing::info!(
                overall = ?snapshot.overall,
                healthy = snapshot.healthy_count,
                total = snapshot.total_count,
                desired = snapshot.desired_count,
                last_error = snapshot.last_error.as_deref().unwrap_or(""),
                "Health verdict changed"
            );
        }
        self.cell.publish(snapshot);
    }
}
