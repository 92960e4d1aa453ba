//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the scheduler.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the canary scheduler.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SchedulerConfig {
    /// HTTP listener for the health endpoint.
    pub listener: ListenerConfig,

    /// How to reach the cluster control plane.
    pub client: ClientConfig,

    /// Canary pool policy.
    pub pool: PoolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Mode by which the control-plane client is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ClientMode {
    /// Service-account credentials from the pod environment.
    #[default]
    InCluster,
    /// Client certificate against a remote API server.
    RemoteTls,
    /// Username and password against a remote API server.
    RemoteBasicAuth,
}

impl ClientMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientMode::InCluster => "in-cluster",
            ClientMode::RemoteTls => "remote-tls",
            ClientMode::RemoteBasicAuth => "remote-basic-auth",
        }
    }
}

/// Control-plane client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub mode: ClientMode,

    /// host:port or URL of the API server (remote modes).
    pub remote_host: Option<String>,

    /// Basic auth username.
    pub username: Option<String>,

    /// Basic auth password.
    pub password: Option<String>,

    /// Path to client TLS certificate (PEM).
    pub tls_cert_file: Option<String>,

    /// Path to client TLS key (PEM).
    pub tls_key_file: Option<String>,

    /// Path to certificate authority bundle (PEM).
    pub tls_ca_file: Option<String>,
}

/// Canary pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Namespace holding every canary unit this process owns.
    pub namespace: String,

    /// Number of canary units to keep alive.
    pub desired_count: usize,

    /// Seconds a canary lives before it is rotated.
    pub ttl_secs: u64,

    /// Seconds between reconciliations.
    pub poll_interval_secs: u64,

    /// Prefix of generated unit names.
    pub name_prefix: String,

    /// Container image run by each canary.
    pub image: String,

    /// Labels stamped on canaries; also the ownership selector.
    pub labels: BTreeMap<String, String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "khealth-canary".to_string());

        Self {
            namespace: "khealth".to_string(),
            desired_count: 3,
            ttl_secs: 120,
            poll_interval_secs: 5,
            name_prefix: "khealth-canary".to_string(),
            image: "gcr.io/google_containers/pause:2.0".to_string(),
            labels,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single control-plane call, in seconds.
    pub call_secs: u64,

    /// How long `terminate` waits for the drain, in seconds.
    pub terminate_secs: u64,

    /// Absolute limit on shutdown before the process gives up on cleanup.
    pub hard_cap_secs: u64,

    /// HTTP request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_secs: 10,
            terminate_secs: 30,
            hard_cap_secs: 60,
            request_secs: 5,
        }
    }
}

impl TimeoutConfig {
    pub fn call(&self) -> Duration {
        Duration::from_secs(self.call_secs)
    }

    pub fn terminate(&self) -> Duration {
        Duration::from_secs(self.terminate_secs)
    }

    pub fn hard_cap(&self) -> Duration {
        Duration::from_secs(self.hard_cap_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_filter: "khealth=info,rcscheduler=info,tower_http=info".to_string(),
        }
    }
}
