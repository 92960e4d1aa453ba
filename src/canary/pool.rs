//! Canary pool reconciliation.
//!
//! # Responsibilities
//! - Keep `desired_count` canary units alive through the control plane
//! - Rotate units at their TTL and evict persistently failed ones
//! - Turn control-plane observations into a `HealthSnapshot`
//! - Delete everything it owns when asked to drain
//!
//! # Reconciliation Order
//! ```text
//! list → refresh (adopt / confirm vanished) → expire → evict failed
//!      → trim surplus → top up → aggregate
//! ```
//!
//! # Design Decisions
//! - A failed listing changes nothing: no creates, no deletes, no observations
//! - Operational errors are absorbed into `last_error`, never returned
//! - Failed deletes keep the unit tracked so the next tick retries it
//! - Only ever driven by one task, so no interior locking

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;

use crate::canary::policy::PoolPolicy;
use crate::canary::unit::{CanaryUnit, UnitState};
use crate::controlplane::{ControlPlane, ControlPlaneError, ObservedUnit, UnitId};
use crate::health::snapshot::{HealthSnapshot, Overall};

/// Outcome of the final cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Units confirmed gone (deleted now or already missing).
    pub deleted: Vec<UnitId>,
    /// Units whose delete failed, with the reason.
    pub failed: Vec<(UnitId, String)>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors absorbed during one reconciliation.
#[derive(Debug, Default)]
struct CycleErrors {
    last: Option<String>,
}

impl CycleErrors {
    fn record(&mut self, operation: &str, unit: Option<&str>, err: &ControlPlaneError) {
        match unit {
            Some(id) => {
                tracing::warn!(operation, unit = %id, error = %err, "Control-plane call failed");
                self.last = Some(format!("{} {}: {}", operation, id, err));
            }
            None => {
                tracing::warn!(operation, error = %err, "Control-plane call failed");
                self.last = Some(format!("{}: {}", operation, err));
            }
        }
    }
}

/// Owns the tracked canary units and reconciles them against the control plane.
pub struct PoolManager {
    policy: PoolPolicy,
    port: Arc<dyn ControlPlane>,
    units: BTreeMap<UnitId, CanaryUnit>,
    /// Snapshot of the most recent cycle whose listing succeeded.
    last_good: Option<HealthSnapshot>,
    /// Listing failures since the last successful listing.
    listing_failures: u32,
}

impl PoolManager {
    pub fn new(policy: PoolPolicy, port: Arc<dyn ControlPlane>) -> Self {
        Self {
            policy,
            port,
            units: BTreeMap::new(),
            last_good: None,
            listing_failures: 0,
        }
    }

    pub fn policy(&self) -> &PoolPolicy {
        &self.policy
    }

    /// Units currently tracked, keyed by id.
    pub fn units(&self) -> &BTreeMap<UnitId, CanaryUnit> {
        &self.units
    }

    /// Reconcile against the wall clock.
    pub async fn reconcile(&mut self) -> HealthSnapshot {
        self.reconcile_at(Utc::now()).await
    }

    /// Run one reconciliation pass as of `now`.
    pub async fn reconcile_at(&mut self, now: DateTime<Utc>) -> HealthSnapshot {
        let selector = self.policy.selector();
        let listing = self.port.list_units(self.policy.namespace(), &selector).await;
        let listed = match listing {
            Ok(listed) => listed,
            Err(err) => return self.listing_failed(now, &err),
        };

        let mut errors = CycleErrors::default();
        self.refresh(listed, now, &mut errors).await;

        let expired: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| u.is_expired(now))
            .map(|u| u.id.clone())
            .collect();
        let failed: Vec<UnitId> = self
            .units
            .values()
            .filter(|u| !u.is_expired(now) && u.is_persistently_failed())
            .map(|u| u.id.clone())
            .collect();

        self.remove(expired, "expired", &mut errors).await;
        self.remove(failed, "failed", &mut errors).await;
        self.trim_surplus(&mut errors).await;
        self.top_up(now, &mut errors).await;

        let snapshot = self.aggregate(now, errors.last);
        self.listing_failures = 0;
        self.last_good = Some(snapshot.clone());

        tracing::debug!(
            healthy = snapshot.healthy_count,
            total = snapshot.total_count,
            overall = ?snapshot.overall,
            "Reconciliation complete"
        );
        snapshot
    }

    /// Delete every tracked unit concurrently, best-effort.
    ///
    /// A final listing also picks up owned units that were never tracked,
    /// such as a create the control plane accepted after its call timed out.
    pub async fn drain(&mut self) -> DrainReport {
        let mut ids: BTreeSet<UnitId> = std::mem::take(&mut self.units).into_keys().collect();

        let selector = self.policy.selector();
        let listing = self.port.list_units(self.policy.namespace(), &selector).await;
        match listing {
            Ok(listed) => {
                for unit in listed {
                    if ids.insert(unit.id.clone()) {
                        tracing::info!(unit = %unit.id, "Draining untracked canary unit");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Final listing failed, draining tracked units only");
            }
        }

        if ids.is_empty() {
            return DrainReport::default();
        }

        tracing::info!(count = ids.len(), "Draining canary units");

        let namespace = self.policy.namespace();
        let port = &self.port;
        let results = join_all(ids.iter().map(|id| async move {
            (id.clone(), port.delete_unit(namespace, id).await)
        }))
        .await;

        let mut report = DrainReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => report.deleted.push(id),
                Err(err) if err.is_not_found() => report.deleted.push(id),
                Err(err) => {
                    tracing::error!(unit = %id, error = %err, "Failed to delete canary unit during drain");
                    report.failed.push((id, err.to_string()));
                }
            }
        }

        tracing::info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Drain finished"
        );
        report
    }

    fn listing_failed(&mut self, now: DateTime<Utc>, err: &ControlPlaneError) -> HealthSnapshot {
        self.listing_failures = self.listing_failures.saturating_add(1);
        tracing::warn!(
            error = %err,
            consecutive = self.listing_failures,
            "Listing canary units failed, skipping this cycle"
        );

        let last_error = Some(format!("list: {}", err));
        match &self.last_good {
            Some(prior) if self.listing_failures == 1 => HealthSnapshot {
                timestamp: now,
                last_error,
                ..prior.clone()
            },
            Some(_) => HealthSnapshot {
                timestamp: now,
                healthy_count: self.units.values().filter(|u| u.is_running()).count(),
                total_count: self.units.len(),
                desired_count: self.policy.desired_count(),
                overall: Overall::Unknown,
                last_error,
            },
            None => HealthSnapshot {
                last_error,
                ..HealthSnapshot::unknown(now, self.policy.desired_count())
            },
        }
    }

    async fn refresh(
        &mut self,
        listed: Vec<ObservedUnit>,
        now: DateTime<Utc>,
        errors: &mut CycleErrors,
    ) {
        let mut observed: BTreeMap<UnitId, ObservedUnit> =
            listed.into_iter().map(|u| (u.id.clone(), u)).collect();

        // Listings can lag behind creates; confirm before forgetting a unit.
        let missing: Vec<UnitId> = self
            .units
            .keys()
            .filter(|id| !observed.contains_key(*id))
            .cloned()
            .collect();
        for id in missing {
            let read = self.port.read_unit(self.policy.namespace(), &id).await;
            match read {
                Ok(unit) => {
                    observed.insert(id, unit);
                }
                Err(err) if err.is_not_found() => {
                    tracing::info!(unit = %id, "Canary unit vanished");
                    self.units.remove(&id);
                }
                Err(err) => errors.record("read", Some(id.as_str()), &err),
            }
        }

        let ttl = self.policy.ttl_delta();
        for (id, unit) in observed {
            let state = UnitState::from(unit.phase);
            match self.units.get_mut(&id) {
                Some(tracked) => tracked.observe(state),
                None => {
                    tracing::info!(unit = %id, ?state, "Adopting untracked canary unit");
                    let created_at = unit.created_at.unwrap_or(now);
                    self.units
                        .insert(id.clone(), CanaryUnit::new(id, created_at, ttl, state));
                }
            }
        }
    }

    async fn remove(&mut self, ids: Vec<UnitId>, reason: &'static str, errors: &mut CycleErrors) {
        for id in ids {
            let deleted = self.port.delete_unit(self.policy.namespace(), &id).await;
            match deleted {
                Ok(()) => {
                    tracing::info!(unit = %id, reason, "Canary unit deleted");
                    self.units.remove(&id);
                }
                Err(err) if err.is_not_found() => {
                    tracing::debug!(unit = %id, reason, "Canary unit already gone");
                    self.units.remove(&id);
                }
                Err(err) => errors.record("delete", Some(id.as_str()), &err),
            }
        }
    }

    async fn trim_surplus(&mut self, errors: &mut CycleErrors) {
        let desired = self.policy.desired_count();
        if self.units.len() <= desired {
            return;
        }

        // Oldest first; they are the closest to rotation anyway.
        let surplus: Vec<UnitId> = {
            let mut by_age: Vec<&CanaryUnit> = self.units.values().collect();
            by_age.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            by_age
                .iter()
                .take(self.units.len() - desired)
                .map(|u| u.id.clone())
                .collect()
        };

        self.remove(surplus, "surplus", errors).await;
    }

    async fn top_up(&mut self, now: DateTime<Utc>, errors: &mut CycleErrors) {
        let missing = self.policy.desired_count().saturating_sub(self.units.len());
        let ttl = self.policy.ttl_delta();

        for _ in 0..missing {
            let spec = self.policy.unit_spec(now);
            let created = self.port.create_unit(&spec).await;
            match created {
                Ok(unit) => {
                    tracing::info!(unit = %unit.id, "Canary unit created");
                    let created_at = unit.created_at.unwrap_or(now);
                    let state = UnitState::from(unit.phase);
                    self.units
                        .insert(unit.id.clone(), CanaryUnit::new(unit.id, created_at, ttl, state));
                }
                Err(err) => errors.record("create", None, &err),
            }
        }
    }

    fn aggregate(&self, now: DateTime<Utc>, last_error: Option<String>) -> HealthSnapshot {
        let desired = self.policy.desired_count();
        let healthy = self.units.values().filter(|u| u.is_running()).count();

        HealthSnapshot {
            timestamp: now,
            healthy_count: healthy,
            total_count: self.units.len(),
            desired_count: desired,
            overall: Overall::from_counts(healthy, desired),
            last_error,
        }
    }
}
