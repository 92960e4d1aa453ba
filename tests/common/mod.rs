//! Shared utilities for integration tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use khealth::canary::PoolPolicy;
use khealth::controlplane::{
    ControlPlane, ControlPlaneError, ControlPlaneResult, ObservedUnit, Selector, UnitPhase,
    UnitSpec,
};

/// Fixed reference instant for clock-driven tests.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Default test policy: namespace "khealth", ttl 120s, poll 5s.
#[allow(dead_code)]
pub fn policy(desired: usize) -> PoolPolicy {
    PoolPolicy::new("khealth", desired, Duration::from_secs(120), Duration::from_secs(5)).unwrap()
}

/// Fast policy for tests that drive the real poll loop.
#[allow(dead_code)]
pub fn fast_policy(desired: usize) -> PoolPolicy {
    PoolPolicy::new(
        "khealth",
        desired,
        Duration::from_secs(60),
        Duration::from_millis(20),
    )
    .unwrap()
}

#[derive(Debug, Clone)]
struct FakePod {
    phase: UnitPhase,
    created_at: DateTime<Utc>,
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct FakeState {
    pods: BTreeMap<String, FakePod>,
    next_id: u64,
    /// Present but missing from listings, like a lagging cache.
    hidden: BTreeSet<String>,
    list_failures: VecDeque<ControlPlaneError>,
    create_failures: VecDeque<ControlPlaneError>,
    delete_failures: VecDeque<ControlPlaneError>,
    deleted: Vec<String>,
}

/// In-memory control plane with scripted failures and call counters.
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
    initial_phase: UnitPhase,
    delete_delay: Duration,
    lists: AtomicUsize,
    creates: AtomicUsize,
    deletes: AtomicUsize,
    reads: AtomicUsize,
}

#[allow(dead_code)]
impl FakeControlPlane {
    /// Created units report Running immediately.
    pub fn new() -> Arc<Self> {
        Self::build(UnitPhase::Running, Duration::ZERO)
    }

    pub fn with_initial_phase(phase: UnitPhase) -> Arc<Self> {
        Self::build(phase, Duration::ZERO)
    }

    /// Every delete sleeps for `delay` before taking effect.
    pub fn with_delete_delay(delay: Duration) -> Arc<Self> {
        Self::build(UnitPhase::Running, delay)
    }

    fn build(initial_phase: UnitPhase, delete_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            initial_phase,
            delete_delay,
            lists: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        })
    }

    /// Seed a pod that this process did not create.
    pub fn insert(&self, id: &str, phase: UnitPhase, created_at: DateTime<Utc>) {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "khealth-canary".to_string());
        self.insert_labeled(id, phase, created_at, labels);
    }

    /// Seed a pod carrying arbitrary labels, e.g. another team's workload.
    pub fn insert_labeled(
        &self,
        id: &str,
        phase: UnitPhase,
        created_at: DateTime<Utc>,
        labels: BTreeMap<String, String>,
    ) {
        self.state.lock().unwrap().pods.insert(
            id.to_string(),
            FakePod {
                phase,
                created_at,
                labels,
            },
        );
    }

    pub fn set_phase(&self, id: &str, phase: UnitPhase) {
        if let Some(pod) = self.state.lock().unwrap().pods.get_mut(id) {
            pod.phase = phase;
        }
    }

    pub fn set_all_phases(&self, phase: UnitPhase) {
        for pod in self.state.lock().unwrap().pods.values_mut() {
            pod.phase = phase;
        }
    }

    /// Delete a pod behind the scheduler's back.
    pub fn vanish(&self, id: &str) {
        self.state.lock().unwrap().pods.remove(id);
    }

    pub fn hide_from_list(&self, id: &str) {
        self.state.lock().unwrap().hidden.insert(id.to_string());
    }

    pub fn fail_next_list(&self, err: ControlPlaneError) {
        self.state.lock().unwrap().list_failures.push_back(err);
    }

    pub fn fail_next_create(&self, err: ControlPlaneError) {
        self.state.lock().unwrap().create_failures.push_back(err);
    }

    pub fn fail_next_delete(&self, err: ControlPlaneError) {
        self.state.lock().unwrap().delete_failures.push_back(err);
    }

    pub fn ids(&self) -> Vec<String> {
        self.state.lock().unwrap().pods.keys().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls() + self.create_calls() + self.delete_calls() + self.read_calls()
    }
}

fn observed(id: &str, pod: &FakePod) -> ObservedUnit {
    ObservedUnit {
        id: id.to_string(),
        phase: pod.phase,
        created_at: Some(pod.created_at),
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn list_units(
        &self,
        _namespace: &str,
        selector: &Selector,
    ) -> ControlPlaneResult<Vec<ObservedUnit>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.list_failures.pop_front() {
            return Err(err);
        }

        Ok(state
            .pods
            .iter()
            .filter(|(id, pod)| !state.hidden.contains(*id) && selector.matches(&pod.labels))
            .map(|(id, pod)| observed(id, pod))
            .collect())
    }

    async fn create_unit(&self, spec: &UnitSpec) -> ControlPlaneResult<ObservedUnit> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.create_failures.pop_front() {
            return Err(err);
        }

        state.next_id += 1;
        let id = format!("{}-{:05}", spec.name_prefix, state.next_id);
        let pod = FakePod {
            phase: self.initial_phase,
            created_at: spec.created_at,
            labels: spec.labels.clone(),
        };
        let unit = observed(&id, &pod);
        state.pods.insert(id, pod);
        Ok(unit)
    }

    async fn delete_unit(&self, _namespace: &str, id: &str) -> ControlPlaneResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if !self.delete_delay.is_zero() {
            tokio::time::sleep(self.delete_delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.delete_failures.pop_front() {
            return Err(err);
        }
        match state.pods.remove(id) {
            Some(_) => {
                state.deleted.push(id.to_string());
                Ok(())
            }
            None => Err(ControlPlaneError::NotFound(id.to_string())),
        }
    }

    async fn read_unit(&self, _namespace: &str, id: &str) -> ControlPlaneResult<ObservedUnit> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .pods
            .get(id)
            .map(|pod| observed(id, pod))
            .ok_or_else(|| ControlPlaneError::NotFound(id.to_string()))
    }
}
