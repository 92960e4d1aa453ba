//! Tracked canary units.
//!
//! # States
//! - Pending: accepted by the control plane, not running yet
//! - Running: the only state counted as healthy
//! - Failed: exited or reported failed
//! - Unknown: no usable phase reported
//!
//! # Design Decisions
//! - Hysteresis: one Failed observation is noise, two in a row evict
//! - Expiry is absolute and independent of health

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::controlplane::{UnitId, UnitPhase};

/// Consecutive Failed observations that evict a unit before its TTL.
pub const FAILURE_THRESHOLD: u32 = 2;

/// Health state of a canary as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Pending,
    Running,
    Failed,
    Unknown,
}

impl From<UnitPhase> for UnitState {
    fn from(phase: UnitPhase) -> Self {
        match phase {
            UnitPhase::Pending => UnitState::Pending,
            UnitPhase::Running => UnitState::Running,
            // A canary is never supposed to exit.
            UnitPhase::Succeeded | UnitPhase::Failed => UnitState::Failed,
            UnitPhase::Unknown => UnitState::Unknown,
        }
    }
}

/// One disposable probe workload tracked by the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanaryUnit {
    pub id: UnitId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_observed_state: UnitState,
    consecutive_failures: u32,
}

impl CanaryUnit {
    pub fn new(id: UnitId, created_at: DateTime<Utc>, ttl: TimeDelta, state: UnitState) -> Self {
        let mut unit = Self {
            id,
            created_at,
            expires_at: created_at + ttl,
            last_observed_state: UnitState::Unknown,
            consecutive_failures: 0,
        };
        unit.observe(state);
        unit
    }

    /// Record one observation from a reconciliation.
    pub fn observe(&mut self, state: UnitState) {
        self.last_observed_state = state;
        if state == UnitState::Failed {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        } else {
            self.consecutive_failures = 0;
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Failed on `FAILURE_THRESHOLD` consecutive observations.
    pub fn is_persistently_failed(&self) -> bool {
        self.consecutive_failures >= FAILURE_THRESHOLD
    }

    pub fn is_running(&self) -> bool {
        self.last_observed_state == UnitState::Running
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
