//! Kubernetes implementation of the control-plane port.
//!
//! # Responsibilities
//! - Represent each canary unit as a Pod in the pool namespace
//! - Map Pod phases to unit phases
//! - Classify API failures into the port's error taxonomy

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, ResourceExt};

use crate::controlplane::{
    ControlPlane, ControlPlaneError, ControlPlaneResult, ObservedUnit, Selector, UnitPhase,
    UnitSpec,
};

/// Annotation carrying the creation time stamped by this process.
pub const CREATED_AT_ANNOTATION: &str = "khealth.coreos.com/created-at";

const CANARY_CONTAINER: &str = "canary";

/// Control plane backed by the Kubernetes Pod API.
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn list_units(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> ControlPlaneResult<Vec<ObservedUnit>> {
        let params = ListParams::default().labels(&selector.to_string());
        let pods = self.pods(namespace).list(&params).await.map_err(classify)?;

        Ok(pods
            .items
            .iter()
            .filter(|pod| pod.metadata.deletion_timestamp.is_none())
            .map(observe)
            .collect())
    }

    async fn create_unit(&self, spec: &UnitSpec) -> ControlPlaneResult<ObservedUnit> {
        let pod = canary_pod(spec);
        let created = self
            .pods(&spec.namespace)
            .create(&PostParams::default(), &pod)
            .await
            .map_err(classify)?;

        tracing::debug!(namespace = %spec.namespace, pod = %created.name_any(), "Canary pod accepted");
        Ok(observe(&created))
    }

    async fn delete_unit(&self, namespace: &str, id: &str) -> ControlPlaneResult<()> {
        self.pods(namespace)
            .delete(id, &DeleteParams::default().grace_period(0))
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn read_unit(&self, namespace: &str, id: &str) -> ControlPlaneResult<ObservedUnit> {
        self.pods(namespace)
            .get(id)
            .await
            .map(|pod| observe(&pod))
            .map_err(classify)
    }
}

/// Build the Pod manifest for one canary unit.
pub fn canary_pod(spec: &UnitSpec) -> Pod {
    let mut annotations = BTreeMap::new();
    annotations.insert(
        CREATED_AT_ANNOTATION.to_string(),
        spec.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", spec.name_prefix)),
            namespace: Some(spec.namespace.clone()),
            labels: Some(spec.labels.clone()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CANARY_CONTAINER.to_string(),
                image: Some(spec.image.clone()),
                ..Default::default()
            }],
            restart_policy: Some("Never".to_string()),
            termination_grace_period_seconds: Some(0),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn observe(pod: &Pod) -> ObservedUnit {
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .map(phase_from_str)
        .unwrap_or(UnitPhase::Unknown);

    let created_at = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(CREATED_AT_ANNOTATION))
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc));

    ObservedUnit {
        id: pod.name_any(),
        phase,
        created_at,
    }
}

fn phase_from_str(phase: &str) -> UnitPhase {
    match phase {
        "Pending" => UnitPhase::Pending,
        "Running" => UnitPhase::Running,
        "Succeeded" => UnitPhase::Succeeded,
        "Failed" => UnitPhase::Failed,
        _ => UnitPhase::Unknown,
    }
}

fn classify(err: kube::Error) -> ControlPlaneError {
    match err {
        kube::Error::Api(response) => classify_status(response.code, response.message),
        other => ControlPlaneError::Transient(other.to_string()),
    }
}

/// Map an API status code to the port's error taxonomy.
pub fn classify_status(code: u16, message: String) -> ControlPlaneError {
    match code {
        401 | 403 => ControlPlaneError::Permission(message),
        404 => ControlPlaneError::NotFound(message),
        408 | 429 | 500..=599 => ControlPlaneError::Transient(format!("{}: {}", code, message)),
        _ => ControlPlaneError::Rejected { code, message },
    }
}
