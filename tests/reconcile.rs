//! Pool reconciliation against an in-memory control plane.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;

use common::{policy, t0, FakeControlPlane};
use khealth::canary::{PoolManager, PoolPolicy, UnitState};
use khealth::config::validation::ValidationError;
use khealth::config::PoolConfig;
use khealth::controlplane::{ControlPlaneError, UnitPhase};
use khealth::health::{HealthCollector, Overall};

fn manager(fake: &Arc<FakeControlPlane>, desired: usize) -> PoolManager {
    PoolManager::new(policy(desired), fake.clone())
}

#[tokio::test]
async fn test_converges_to_desired_count() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);

    let snapshot = pool.reconcile_at(t0()).await;

    assert_eq!(fake.create_calls(), 3);
    assert_eq!(snapshot.total_count, 3);
    assert_eq!(snapshot.healthy_count, 3);
    assert_eq!(snapshot.desired_count, 3);
    assert_eq!(snapshot.overall, Overall::Healthy);
    assert_eq!(snapshot.last_error, None);
    assert_eq!(snapshot.timestamp, t0());
}

#[tokio::test]
async fn test_pending_units_are_not_healthy() {
    let fake = FakeControlPlane::with_initial_phase(UnitPhase::Pending);
    let mut pool = manager(&fake, 3);

    let snapshot = pool.reconcile_at(t0()).await;
    assert_eq!(snapshot.total_count, 3);
    assert_eq!(snapshot.healthy_count, 0);
    assert_eq!(snapshot.overall, Overall::Unhealthy);

    let ids = fake.ids();
    fake.set_phase(&ids[0], UnitPhase::Running);
    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;
    assert_eq!(snapshot.overall, Overall::Degraded);

    fake.set_all_phases(UnitPhase::Running);
    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(10)).await;
    assert_eq!(snapshot.overall, Overall::Healthy);
    assert_eq!(fake.create_calls(), 3, "no churn while units start");
}

#[tokio::test]
async fn test_expired_units_are_rotated_regardless_of_health() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;
    let original = fake.ids();

    // One tick short of the TTL: nothing happens.
    pool.reconcile_at(t0() + TimeDelta::seconds(119)).await;
    assert_eq!(fake.delete_calls(), 0);

    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(120)).await;

    assert_eq!(fake.delete_calls(), 3);
    assert_eq!(fake.create_calls(), 6);
    assert_eq!(fake.deleted(), original);
    assert!(fake.ids().iter().all(|id| !original.contains(id)));
    assert_eq!(snapshot.total_count, 3);
    assert_eq!(snapshot.overall, Overall::Healthy);
}

#[tokio::test]
async fn test_single_failure_is_tolerated() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;
    let flaky = fake.ids()[0].clone();

    fake.set_phase(&flaky, UnitPhase::Failed);
    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;
    assert_eq!(fake.delete_calls(), 0);
    assert_eq!(snapshot.overall, Overall::Degraded);
    assert_eq!(pool.units()[&flaky].last_observed_state, UnitState::Failed);

    fake.set_phase(&flaky, UnitPhase::Running);
    pool.reconcile_at(t0() + TimeDelta::seconds(10)).await;

    fake.set_phase(&flaky, UnitPhase::Failed);
    pool.reconcile_at(t0() + TimeDelta::seconds(15)).await;

    assert_eq!(fake.delete_calls(), 0, "failures were never consecutive");
    assert!(pool.units().contains_key(&flaky));
}

#[tokio::test]
async fn test_consecutive_failures_evict_before_ttl() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;
    let broken = fake.ids()[1].clone();

    fake.set_phase(&broken, UnitPhase::Failed);
    pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;
    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(10)).await;

    assert_eq!(fake.deleted(), vec![broken.clone()]);
    assert!(!pool.units().contains_key(&broken));
    assert_eq!(fake.create_calls(), 4);
    assert_eq!(snapshot.total_count, 3);
    assert_eq!(snapshot.overall, Overall::Healthy);
}

#[tokio::test]
async fn test_succeeded_counts_as_failed() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 1);
    pool.reconcile_at(t0()).await;
    let id = fake.ids()[0].clone();

    fake.set_phase(&id, UnitPhase::Succeeded);
    pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;
    pool.reconcile_at(t0() + TimeDelta::seconds(10)).await;

    assert_eq!(fake.deleted(), vec![id]);
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;

    let first = pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;
    let units_after_first = pool.units().clone();
    let second = pool.reconcile_at(t0() + TimeDelta::seconds(10)).await;

    assert_eq!(pool.units(), &units_after_first);
    assert!(first.same_verdict(&second));
    assert_ne!(first.timestamp, second.timestamp);
    assert_eq!(fake.create_calls(), 3);
    assert_eq!(fake.delete_calls(), 0);
    assert_eq!(fake.read_calls(), 0);
}

#[tokio::test]
async fn test_transient_listing_failure_changes_nothing() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;
    let tracked = pool.units().clone();

    fake.fail_next_list(ControlPlaneError::Transient("connection reset".into()));
    let failed = pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;

    assert!(failed.last_error.as_deref().unwrap().contains("connection reset"));
    assert_eq!(failed.overall, Overall::Healthy, "first failure keeps the prior verdict");
    assert_eq!(failed.total_count, 3);
    assert_eq!(pool.units(), &tracked);
    assert_eq!(fake.create_calls(), 3);
    assert_eq!(fake.delete_calls(), 0);

    let recovered = pool.reconcile_at(t0() + TimeDelta::seconds(10)).await;
    assert_eq!(recovered.last_error, None);
    assert_eq!(recovered.overall, Overall::Healthy);
}

#[tokio::test]
async fn test_listing_failure_does_not_expire_units() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 2);
    pool.reconcile_at(t0()).await;

    fake.fail_next_list(ControlPlaneError::Transient("eof".into()));
    pool.reconcile_at(t0() + TimeDelta::seconds(300)).await;

    assert_eq!(fake.delete_calls(), 0);
    assert_eq!(pool.units().len(), 2);
}

#[tokio::test]
async fn test_repeated_listing_failures_become_unknown() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;

    fake.fail_next_list(ControlPlaneError::Transient("eof".into()));
    fake.fail_next_list(ControlPlaneError::Transient("eof".into()));
    pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;
    let second = pool.reconcile_at(t0() + TimeDelta::seconds(10)).await;

    assert_eq!(second.overall, Overall::Unknown);
    assert_eq!(second.total_count, 3);
    assert_eq!(second.healthy_count, 3);
    assert!(second.last_error.is_some());
}

#[tokio::test]
async fn test_first_listing_failure_without_history_is_unknown() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);

    fake.fail_next_list(ControlPlaneError::Timeout {
        operation: "list",
        after: Duration::from_secs(10),
    });
    let snapshot = pool.reconcile_at(t0()).await;

    assert_eq!(snapshot.overall, Overall::Unknown);
    assert_eq!(snapshot.total_count, 0);
    assert_eq!(snapshot.healthy_count, 0);
    assert!(snapshot.last_error.as_deref().unwrap().contains("timed out"));
    assert_eq!(fake.create_calls(), 0);
}

#[tokio::test]
async fn test_permission_errors_surface_and_keep_trying() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 2);

    fake.fail_next_create(ControlPlaneError::Permission("pods is forbidden".into()));
    fake.fail_next_create(ControlPlaneError::Permission("pods is forbidden".into()));
    let snapshot = pool.reconcile_at(t0()).await;

    assert_eq!(snapshot.total_count, 0);
    assert_eq!(snapshot.overall, Overall::Unhealthy);
    assert!(snapshot.last_error.as_deref().unwrap().contains("forbidden"));

    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;
    assert_eq!(fake.create_calls(), 4);
    assert_eq!(snapshot.total_count, 2);
    assert_eq!(snapshot.last_error, None, "errors only describe the latest cycle");
}

#[tokio::test]
async fn test_partial_create_failure_does_not_abort_cycle() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);

    fake.fail_next_create(ControlPlaneError::Rejected {
        code: 422,
        message: "quota exceeded".into(),
    });
    let snapshot = pool.reconcile_at(t0()).await;

    assert_eq!(fake.create_calls(), 3);
    assert_eq!(snapshot.total_count, 2);
    assert_eq!(snapshot.overall, Overall::Degraded);
    assert!(snapshot.last_error.as_deref().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn test_adopts_existing_units_and_trims_oldest_surplus() {
    let fake = FakeControlPlane::new();
    for (i, id) in ["canary-a", "canary-b", "canary-c", "canary-d", "canary-e"]
        .iter()
        .enumerate()
    {
        fake.insert(id, UnitPhase::Running, t0() - TimeDelta::seconds(50 - i as i64 * 10));
    }
    let mut pool = manager(&fake, 3);

    let snapshot = pool.reconcile_at(t0()).await;

    assert_eq!(fake.deleted(), vec!["canary-a".to_string(), "canary-b".to_string()]);
    assert_eq!(fake.create_calls(), 0);
    assert_eq!(snapshot.total_count, 3);
    assert_eq!(snapshot.overall, Overall::Healthy);

    let adopted = &pool.units()["canary-c"];
    assert_eq!(adopted.created_at, t0() - TimeDelta::seconds(30));
    assert_eq!(adopted.expires_at, t0() + TimeDelta::seconds(90));
}

#[tokio::test]
async fn test_vanished_unit_is_replaced() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 2);
    pool.reconcile_at(t0()).await;
    let gone = fake.ids()[0].clone();

    fake.vanish(&gone);
    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;

    assert_eq!(fake.read_calls(), 1);
    assert!(!pool.units().contains_key(&gone));
    assert_eq!(fake.create_calls(), 3);
    assert_eq!(snapshot.total_count, 2);
}

#[tokio::test]
async fn test_lagging_listing_does_not_drop_unit() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 2);
    pool.reconcile_at(t0()).await;
    let lagging = fake.ids()[1].clone();

    fake.hide_from_list(&lagging);
    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(5)).await;

    assert_eq!(fake.read_calls(), 1);
    assert!(pool.units().contains_key(&lagging));
    assert_eq!(fake.create_calls(), 2);
    assert_eq!(snapshot.overall, Overall::Healthy);
}

#[tokio::test]
async fn test_failed_delete_is_retried_next_tick() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 1);
    pool.reconcile_at(t0()).await;
    let old = fake.ids()[0].clone();

    fake.fail_next_delete(ControlPlaneError::Transient("503 unavailable".into()));
    let snapshot = pool.reconcile_at(t0() + TimeDelta::seconds(120)).await;
    assert!(pool.units().contains_key(&old));
    assert!(snapshot.last_error.is_some());
    assert_eq!(fake.create_calls(), 1, "still at desired count");

    pool.reconcile_at(t0() + TimeDelta::seconds(125)).await;
    assert_eq!(fake.deleted(), vec![old.clone()]);
    assert!(!pool.units().contains_key(&old));
    assert_eq!(fake.create_calls(), 2);
}

#[tokio::test]
async fn test_drain_deletes_everything() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;
    let doomed = fake.ids()[2].clone();
    fake.vanish(&doomed);

    let report = pool.drain().await;

    assert_eq!(fake.delete_calls(), 3);
    assert_eq!(report.deleted.len(), 3, "already missing counts as deleted");
    assert!(report.is_complete());
    assert!(pool.units().is_empty());
    assert!(fake.ids().is_empty());
}

#[tokio::test]
async fn test_drain_continues_past_failures() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 3);
    pool.reconcile_at(t0()).await;

    fake.fail_next_delete(ControlPlaneError::Permission("forbidden".into()));
    let report = pool.drain().await;

    assert_eq!(fake.delete_calls(), 3);
    assert_eq!(report.deleted.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.is_complete());
}

#[tokio::test]
async fn test_invalid_policy_fails_before_any_call() {
    let fake = FakeControlPlane::new();

    let err = PoolPolicy::new(
        "khealth",
        3,
        Duration::from_secs(5),
        Duration::from_secs(10),
    )
    .unwrap_err();
    assert!(!err.errors.is_empty());

    let config = PoolConfig {
        ttl_secs: 5,
        poll_interval_secs: 10,
        ..PoolConfig::default()
    };
    assert!(HealthCollector::from_config(&config, fake.clone()).is_err());
    assert_eq!(fake.total_calls(), 0);
}

#[tokio::test]
async fn test_drain_sweeps_owned_units_that_were_never_tracked() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 2);
    pool.reconcile_at(t0()).await;

    // Accepted by the control plane after the create call gave up.
    fake.insert("khealth-canary-late", UnitPhase::Pending, t0());
    let mut other = BTreeMap::new();
    other.insert("app".to_string(), "postgres".to_string());
    fake.insert_labeled("db-0", UnitPhase::Running, t0(), other);

    let report = pool.drain().await;

    assert_eq!(fake.delete_calls(), 3);
    assert_eq!(report.deleted.len(), 3);
    assert!(report.deleted.contains(&"khealth-canary-late".to_string()));
    assert_eq!(fake.ids(), vec!["db-0".to_string()]);
}

#[tokio::test]
async fn test_drain_still_deletes_tracked_units_when_final_listing_fails() {
    let fake = FakeControlPlane::new();
    let mut pool = manager(&fake, 2);
    pool.reconcile_at(t0()).await;

    fake.fail_next_list(ControlPlaneError::Transient("eof".into()));
    let report = pool.drain().await;

    assert_eq!(report.deleted.len(), 2);
    assert!(fake.ids().is_empty());
}

#[tokio::test]
async fn test_empty_labels_never_reach_foreign_pods() {
    let fake = FakeControlPlane::new();
    for id in ["db-0", "db-1", "web-a"] {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "shop".to_string());
        fake.insert_labeled(id, UnitPhase::Running, t0(), labels);
    }

    let config = PoolConfig {
        labels: BTreeMap::new(),
        ..PoolConfig::default()
    };
    let err = HealthCollector::from_config(&config, fake.clone())
        .err()
        .expect("empty selector must be rejected");

    assert_eq!(err.errors, vec![ValidationError::EmptySelector]);
    assert_eq!(fake.total_calls(), 0);
    assert_eq!(fake.ids().len(), 3);
}
