//! khealth rcscheduler
//!
//! Keeps a small pool of disposable canary pods alive in a Kubernetes
//! namespace and reports whether the cluster keeps them running.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────┐
//!                  │                  RCSCHEDULER                      │
//!                  │                                                   │
//!                  │  ┌───────────┐   tick   ┌──────────────┐          │
//!                  │  │ poll loop │─────────▶│ pool manager │          │
//!                  │  └─────┬─────┘          └──────┬───────┘          │
//!                  │        │ publish               │ list/create/    │
//!                  │        ▼                       │ delete/read     │
//!                  │  ┌───────────┐                 ▼                 │
//!  GET /health ────┼─▶│ snapshot  │          ┌──────────────┐         │
//!  ◀── 200 / 503 ──┼──│   cell    │          │ control plane│─────────┼──▶ kube-apiserver
//!                  │  └───────────┘          │  (deadline)  │         │
//!                  │                         └──────────────┘         │
//!                  └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use khealth::config::cli::Cli;
use khealth::config::loader::{finalize, read_config};
use khealth::config::SchedulerConfig;
use khealth::lifecycle::startup;
use khealth::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => SchedulerConfig::default(),
    };
    cli.apply(&mut config);
    let config = finalize(config)?;

    logging::init(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rcscheduler starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        client_mode = config.client.mode.as_str(),
        namespace = %config.pool.namespace,
        replicas = config.pool.desired_count,
        pod_ttl_secs = config.pool.ttl_secs,
        poll_interval_secs = config.pool.poll_interval_secs,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
