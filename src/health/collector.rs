//! Public face of the scheduler: start, terminate, read the verdict.
//!
//! # Responsibilities
//! - Own the lifecycle state machine and enforce its transitions
//! - Spawn the poll loop on `start` and signal it on `terminate`
//! - Serve the latest snapshot to any number of concurrent readers
//!
//! # Design Decisions
//! - Lifecycle state lives in a watch channel; transitions are compare-and-set
//! - `terminate` waits under a deadline; cleanup keeps running if it elapses
//! - Readers only touch the snapshot cell, never the pool

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;

use crate::canary::{ConfigurationError, DrainReport, PoolManager, PoolPolicy};
use crate::config::{PoolConfig, TimeoutConfig};
use crate::controlplane::ControlPlane;
use crate::health::poll::PollLoop;
use crate::health::snapshot::{HealthSnapshot, SnapshotCell};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::SchedulerState;

/// Lifecycle misuse and shutdown outcomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler already started (state: {0})")]
    AlreadyStarted(SchedulerState),

    #[error("scheduler was never started")]
    NotStarted,

    #[error("cleanup still running after {waited:?} (state: {state})")]
    TerminateDeadline {
        waited: Duration,
        state: SchedulerState,
    },

    #[error("poll loop ended without draining")]
    LoopAborted,
}

pub struct HealthCollector {
    state: Arc<watch::Sender<SchedulerState>>,
    cell: Arc<SnapshotCell>,
    shutdown: Shutdown,
    pending: Mutex<Option<PollLoop>>,
    report: Arc<OnceLock<DrainReport>>,
    terminate_timeout: Duration,
}

impl HealthCollector {
    /// Build a collector around an already validated policy.
    pub fn new(policy: PoolPolicy, port: Arc<dyn ControlPlane>) -> Self {
        let cell = Arc::new(SnapshotCell::new(HealthSnapshot::unknown(
            Utc::now(),
            policy.desired_count(),
        )));
        let poll = PollLoop::new(PoolManager::new(policy, port), cell.clone());
        let (state, _) = watch::channel(SchedulerState::NotStarted);

        Self {
            state: Arc::new(state),
            cell,
            shutdown: Shutdown::new(),
            pending: Mutex::new(Some(poll)),
            report: Arc::new(OnceLock::new()),
            terminate_timeout: TimeoutConfig::default().terminate(),
        }
    }

    /// Validate `config` and build a collector; nothing touches `port` on failure.
    pub fn from_config(
        config: &PoolConfig,
        port: Arc<dyn ControlPlane>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self::new(PoolPolicy::from_config(config)?, port))
    }

    pub fn with_terminate_timeout(mut self, limit: Duration) -> Self {
        self.terminate_timeout = limit;
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Latest published snapshot; `Unknown` until the first reconciliation lands.
    pub fn current_status(&self) -> Arc<HealthSnapshot> {
        self.cell.load()
    }

    /// Spawn the poll loop. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        advance(&self.state, SchedulerState::Running).map_err(SchedulerError::AlreadyStarted)?;

        let poll = match self.pending.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(poll) = poll else {
            return Err(SchedulerError::AlreadyStarted(SchedulerState::Running));
        };

        let inner = tokio::spawn(poll.run(self.shutdown.subscribe()));
        let state = self.state.clone();
        let report = self.report.clone();
        tokio::spawn(async move {
            match inner.await {
                Ok(drained) => {
                    let _ = report.set(drained);
                }
                Err(err) => tracing::error!(error = %err, "Poll loop task failed"),
            }
            // Only moves when the loop ended without terminate(), e.g. a panic.
            let _ = advance(&state, SchedulerState::Terminating);
            if let Err(observed) = advance(&state, SchedulerState::Terminated) {
                tracing::error!(state = %observed, "Poll loop finished outside Terminating");
            }
        });

        tracing::info!("Health collector started");
        Ok(())
    }

    /// Terminate and wait up to the configured deadline.
    pub async fn terminate(&self) -> Result<DrainReport, SchedulerError> {
        self.terminate_within(self.terminate_timeout).await
    }

    /// Signal the poll loop to drain and wait up to `limit` for it to finish.
    ///
    /// Repeated calls wait on the same drain; only the first one signals.
    pub async fn terminate_within(&self, limit: Duration) -> Result<DrainReport, SchedulerError> {
        match advance(&self.state, SchedulerState::Terminating) {
            Ok(()) => {
                tracing::info!(deadline_ms = limit.as_millis() as u64, "Termination requested");
                self.shutdown.trigger();
            }
            Err(SchedulerState::NotStarted) => return Err(SchedulerError::NotStarted),
            Err(_) => {}
        }

        self.wait_terminated(limit).await
    }

    /// Wait up to `limit` for the drain to finish without signalling anything.
    pub async fn wait_terminated(&self, limit: Duration) -> Result<DrainReport, SchedulerError> {
        let mut rx = self.state.subscribe();
        let reached = tokio::time::timeout(limit, async move {
            rx.wait_for(|state| *state == SchedulerState::Terminated)
                .await
                .map(|_| ())
        })
        .await;

        match reached {
            Ok(_) => self.report.get().cloned().ok_or(SchedulerError::LoopAborted),
            Err(_) => Err(SchedulerError::TerminateDeadline {
                waited: limit,
                state: self.state(),
            }),
        }
    }
}

/// Move to `next` if the transition table allows it from the current state.
///
/// On refusal, returns the state that was observed.
fn advance(
    state: &watch::Sender<SchedulerState>,
    next: SchedulerState,
) -> Result<(), SchedulerState> {
    let mut observed = next;
    let moved = state.send_if_modified(|current| {
        observed = *current;
        if current.can_transition_to(next) {
            *current = next;
            true
        } else {
            false
        }
    });

    if moved {
        Ok(())
    } else {
        Err(observed)
    }
}
