//! Command-line flags for the `rcscheduler` binary.
//!
//! Every flag can also be supplied as `KHEALTH_RCSCHEDULER_<FLAG>` in the
//! environment. Flags win over the config file, which wins over defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{ClientMode, SchedulerConfig};

#[derive(Debug, Parser)]
#[command(name = "rcscheduler")]
#[command(about = "Keeps a pool of canary pods alive and reports cluster health", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "KHEALTH_RCSCHEDULER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bind http server to this address
    #[arg(long, env = "KHEALTH_RCSCHEDULER_LISTEN")]
    pub listen: Option<String>,

    /// Mode by which this client is configured to talk to the k8s api
    #[arg(long, value_enum, env = "KHEALTH_RCSCHEDULER_CLIENT_MODE")]
    pub client_mode: Option<ClientMode>,

    /// host:port or url of k8s api server
    #[arg(long, env = "KHEALTH_RCSCHEDULER_REMOTE_HOST")]
    pub remote_host: Option<String>,

    /// Basic auth username
    #[arg(long, env = "KHEALTH_RCSCHEDULER_REMOTE_USERNAME")]
    pub remote_username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "KHEALTH_RCSCHEDULER_REMOTE_PASSWORD", hide_env_values = true)]
    pub remote_password: Option<String>,

    /// Path to tls cert file
    #[arg(long, env = "KHEALTH_RCSCHEDULER_REMOTE_TLS_CERT_FILE")]
    pub remote_tls_cert_file: Option<String>,

    /// Path to tls key file
    #[arg(long, env = "KHEALTH_RCSCHEDULER_REMOTE_TLS_KEY_FILE")]
    pub remote_tls_key_file: Option<String>,

    /// Path to tls certificate authority file
    #[arg(long, env = "KHEALTH_RCSCHEDULER_REMOTE_TLS_CA_FILE")]
    pub remote_tls_ca_file: Option<String>,

    /// Number of seconds between kubernetes api status polls
    #[arg(long, env = "KHEALTH_RCSCHEDULER_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Number of seconds to leave canary pods running before destroying and re-creating
    #[arg(long, env = "KHEALTH_RCSCHEDULER_POD_TTL")]
    pub pod_ttl: Option<u64>,

    /// Namespace holding the canary pods
    #[arg(long, env = "KHEALTH_RCSCHEDULER_NAMESPACE")]
    pub namespace: Option<String>,

    /// Number of canary pods to keep alive
    #[arg(long, env = "KHEALTH_RCSCHEDULER_REPLICA_COUNT")]
    pub replica_count: Option<usize>,
}

impl Cli {
    /// Overlay every flag that was given onto `config`.
    pub fn apply(&self, config: &mut SchedulerConfig) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }
        fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *slot = value.clone();
            }
        }

        set(&mut config.listener.bind_address, &self.listen);
        set(&mut config.client.mode, &self.client_mode);
        set_opt(&mut config.client.remote_host, &self.remote_host);
        set_opt(&mut config.client.username, &self.remote_username);
        set_opt(&mut config.client.password, &self.remote_password);
        set_opt(&mut config.client.tls_cert_file, &self.remote_tls_cert_file);
        set_opt(&mut config.client.tls_key_file, &self.remote_tls_key_file);
        set_opt(&mut config.client.tls_ca_file, &self.remote_tls_ca_file);
        set(&mut config.pool.poll_interval_secs, &self.poll_interval);
        set(&mut config.pool.ttl_secs, &self.pod_ttl);
        set(&mut config.pool.namespace, &self.namespace);
        set(&mut config.pool.desired_count, &self.replica_count);
    }
}
