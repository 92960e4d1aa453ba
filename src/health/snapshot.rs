//! Aggregate health verdict and its published holder.
//!
//! # Design Decisions
//! - Snapshots are immutable values; publishing swaps an `Arc`
//! - Readers never block the writer and never see a partial snapshot

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall verdict over the canary pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl Overall {
    /// Verdict for a successful listing.
    ///
    /// Zero tracked units after a successful listing means nothing could be
    /// started, which counts as Unhealthy rather than Unknown.
    pub fn from_counts(healthy: usize, desired: usize) -> Self {
        if desired > 0 && healthy >= desired {
            Overall::Healthy
        } else if healthy > 0 {
            Overall::Degraded
        } else {
            Overall::Unhealthy
        }
    }

    /// Return true if the endpoint should answer with a success status.
    pub fn is_serving(&self) -> bool {
        matches!(self, Overall::Healthy | Overall::Degraded)
    }
}

/// The externally visible verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub healthy_count: usize,
    pub total_count: usize,
    pub desired_count: usize,
    pub overall: Overall,
    pub last_error: Option<String>,
}

impl HealthSnapshot {
    /// Placeholder used before any reconciliation has completed.
    pub fn unknown(timestamp: DateTime<Utc>, desired_count: usize) -> Self {
        Self {
            timestamp,
            healthy_count: 0,
            total_count: 0,
            desired_count,
            overall: Overall::Unknown,
            last_error: None,
        }
    }

    /// Equality that ignores `timestamp`.
    pub fn same_verdict(&self, other: &HealthSnapshot) -> bool {
        self.healthy_count == other.healthy_count
            && self.total_count == other.total_count
            && self.desired_count == other.desired_count
            && self.overall == other.overall
            && self.last_error == other.last_error
    }
}

/// Single-writer, many-reader holder of the latest snapshot.
#[derive(Debug)]
pub struct SnapshotCell {
    current: ArcSwap<HealthSnapshot>,
}

impl SnapshotCell {
    pub fn new(initial: HealthSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn load(&self) -> Arc<HealthSnapshot> {
        self.current.load_full()
    }

    /// Replace the current snapshot; the previous one is dropped once unread.
    pub fn publish(&self, snapshot: HealthSnapshot) {
        self.current.store(Arc::new(snapshot));
    }
}
