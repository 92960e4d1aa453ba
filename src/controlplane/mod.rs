//! Control-plane port.
//!
//! # Data Flow
//! ```text
//! PoolManager (canary/pool.rs)
//!     → dyn ControlPlane (this module)
//!     → TimeoutControlPlane (resilience/timeouts.rs, per-call deadline)
//!     → KubeControlPlane (kubernetes.rs, Pods in one namespace)
//! ```
//!
//! # Design Decisions
//! - The pool only sees this trait, so it can be driven by an in-memory fake
//! - Every call may be slow and may fail; nothing here retries
//! - NotFound is an error variant; callers decide whether it is benign

pub mod client;
pub mod kubernetes;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use self::client::{connect, ClientError};
pub use self::kubernetes::KubeControlPlane;

/// Identifier assigned to a unit by the control plane.
pub type UnitId = String;

/// Lifecycle phase as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// A managed unit as seen in a list/read/create response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedUnit {
    pub id: UnitId,
    pub phase: UnitPhase,
    /// Creation time recorded on the unit, when the control plane carries one.
    pub created_at: Option<DateTime<Utc>>,
}

/// Label selector scoping the units this process owns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    labels: BTreeMap<String, String>,
}

impl Selector {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// Return true if every selector label is present with the same value.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).map(|found| found == v).unwrap_or(false))
    }
}

impl fmt::Display for Selector {
    /// Renders as `k1=v1,k2=v2` in key order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// What to create for one canary unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub namespace: String,
    /// Prefix for the control-plane generated name.
    pub name_prefix: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Errors returned by control-plane operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// Network or server-side failure expected to clear on its own.
    #[error("transient control-plane error: {0}")]
    Transient(String),

    /// The call did not finish before its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Authentication or authorization failure.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The named unit does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The control plane refused the request for another reason.
    #[error("request rejected ({code}): {message}")]
    Rejected { code: u16, message: String },
}

impl ControlPlaneError {
    /// Return true if the next tick is expected to succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for control-plane operations.
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// The capability the canary pool consumes.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List units in `namespace` matching `selector`.
    async fn list_units(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> ControlPlaneResult<Vec<ObservedUnit>>;

    /// Ask the control plane to create a unit. Acceptance does not mean Running.
    async fn create_unit(&self, spec: &UnitSpec) -> ControlPlaneResult<ObservedUnit>;

    /// Delete a unit by id.
    async fn delete_unit(&self, namespace: &str, id: &str) -> ControlPlaneResult<()>;

    /// Read the current status of a single unit.
    async fn read_unit(&self, namespace: &str, id: &str) -> ControlPlaneResult<ObservedUnit>;
}
