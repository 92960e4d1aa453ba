//! Timeout enforcement for control-plane calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::controlplane::{
    ControlPlane, ControlPlaneError, ControlPlaneResult, ObservedUnit, Selector, UnitSpec,
};

/// Run `fut` with a deadline, mapping expiry to a transient timeout error.
pub async fn with_deadline<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> ControlPlaneResult<T>
where
    F: Future<Output = ControlPlaneResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ControlPlaneError::Timeout {
            operation,
            after: limit,
        }),
    }
}

/// Control plane wrapper that bounds every call.
pub struct TimeoutControlPlane<P> {
    inner: P,
    limit: Duration,
}

impl<P> TimeoutControlPlane<P> {
    pub fn new(inner: P, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<P: ControlPlane> ControlPlane for TimeoutControlPlane<P> {
    async fn list_units(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> ControlPlaneResult<Vec<ObservedUnit>> {
        with_deadline("list", self.limit, self.inner.list_units(namespace, selector)).await
    }

    async fn create_unit(&self, spec: &UnitSpec) -> ControlPlaneResult<ObservedUnit> {
        with_deadline("create", self.limit, self.inner.create_unit(spec)).await
    }

    async fn delete_unit(&self, namespace: &str, id: &str) -> ControlPlaneResult<()> {
        with_deadline("delete", self.limit, self.inner.delete_unit(namespace, id)).await
    }

    async fn read_unit(&self, namespace: &str, id: &str) -> ControlPlaneResult<ObservedUnit> {
        with_deadline("read", self.limit, self.inner.read_unit(namespace, id)).await
    }
}
