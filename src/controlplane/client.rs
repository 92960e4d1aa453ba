//! Kubernetes client construction per client mode.
//!
//! # Responsibilities
//! - In-cluster: service-account token and CA from the pod environment
//! - Remote modes: synthesize a single-context kubeconfig from flags
//!
//! # Design Decisions
//! - Remote credentials go through kubeconfig so kube resolves files itself
//! - Missing arguments are reported before any network activity

use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use kube::Client;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::{ClientConfig, ClientMode};

const CLUSTER_NAME: &str = "remote";
const USER_NAME: &str = "rcscheduler";

/// Errors raised while building the control-plane client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client mode {mode} requires {argument}")]
    MissingArgument {
        mode: &'static str,
        argument: &'static str,
    },

    #[error("in-cluster configuration unavailable: {0}")]
    InCluster(#[from] kube::config::InClusterError),

    #[error("invalid remote configuration: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("invalid remote configuration: {0}")]
    Document(#[from] serde_json::Error),

    #[error("failed to create client: {0}")]
    Client(#[from] kube::Error),
}

/// Build a client for the configured mode.
pub async fn connect(config: &ClientConfig) -> Result<Client, ClientError> {
    let kube_config = match config.mode {
        ClientMode::InCluster => Config::incluster()?,
        ClientMode::RemoteTls | ClientMode::RemoteBasicAuth => {
            let kubeconfig = remote_kubeconfig(config)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
    };

    tracing::info!(
        mode = config.mode.as_str(),
        cluster_url = %kube_config.cluster_url,
        "Control-plane client configured"
    );

    Ok(Client::try_from(kube_config)?)
}

/// Translate remote-mode flags into a kubeconfig with one context.
pub fn remote_kubeconfig(config: &ClientConfig) -> Result<Kubeconfig, ClientError> {
    let mode = config.mode.as_str();
    let required = |value: &Option<String>, argument: &'static str| {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(ClientError::MissingArgument { mode, argument })
    };

    let host = required(&config.remote_host, "remote_host")?;
    let server = if host.contains("://") {
        host
    } else {
        format!("https://{}", host)
    };

    let mut cluster = Map::new();
    cluster.insert("server".into(), Value::String(server));
    if let Some(ca) = config.tls_ca_file.as_deref().filter(|v| !v.is_empty()) {
        cluster.insert("certificate-authority".into(), Value::String(ca.to_string()));
    }

    let mut user = Map::new();
    match config.mode {
        ClientMode::RemoteTls => {
            user.insert(
                "client-certificate".into(),
                Value::String(required(&config.tls_cert_file, "tls_cert_file")?),
            );
            user.insert(
                "client-key".into(),
                Value::String(required(&config.tls_key_file, "tls_key_file")?),
            );
        }
        ClientMode::RemoteBasicAuth => {
            user.insert(
                "username".into(),
                Value::String(required(&config.username, "username")?),
            );
            user.insert(
                "password".into(),
                Value::String(required(&config.password, "password")?),
            );
        }
        ClientMode::InCluster => {}
    }

    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": CLUSTER_NAME, "cluster": cluster }],
        "users": [{ "name": USER_NAME, "user": user }],
        "contexts": [{
            "name": CLUSTER_NAME,
            "context": { "cluster": CLUSTER_NAME, "user": USER_NAME },
        }],
        "current-context": CLUSTER_NAME,
    });

    Ok(serde_json::from_value(document)?)
}
