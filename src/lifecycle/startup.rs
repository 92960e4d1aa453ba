//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the control-plane client for the configured mode
//! - Initialize the collector and start the poll loop
//! - Bind the listener and serve the health endpoint
//! - On termination: drain under a deadline, then stop HTTP
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The health endpoint keeps answering while the pool drains
//! - The process never outlives the hard cap waiting on cleanup

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::time::Instant;

use crate::canary::ConfigurationError;
use crate::config::SchedulerConfig;
use crate::controlplane::{self, ClientError, ControlPlane, KubeControlPlane};
use crate::health::{HealthCollector, SchedulerError};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals;
use crate::resilience::TimeoutControlPlane;

/// Errors that abort the process.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("control-plane client: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Policy(#[from] ConfigurationError),

    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server task failed: {0}")]
    Server(#[from] tokio::task::JoinError),
}

/// Run the scheduler until an OS termination signal arrives.
pub async fn run(config: SchedulerConfig) -> Result<(), StartupError> {
    let client = controlplane::connect(&config.client).await?;
    let port: Arc<dyn ControlPlane> = Arc::new(TimeoutControlPlane::new(
        KubeControlPlane::new(client),
        config.timeouts.call(),
    ));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    run_until(config, port, listener, async {
        if let Err(err) = signals::wait_for_termination().await {
            tracing::error!(error = %err, "Failed to install signal handlers, terminating");
        }
    })
    .await
}

/// Run against an explicit port and listener until `termination` resolves.
pub async fn run_until<F>(
    config: SchedulerConfig,
    port: Arc<dyn ControlPlane>,
    listener: TcpListener,
    termination: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()>,
{
    let collector = Arc::new(
        HealthCollector::from_config(&config.pool, port)?
            .with_terminate_timeout(config.timeouts.terminate()),
    );
    collector.start()?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config.timeouts, collector.clone());
    let http = tokio::spawn(server.run(listener, shutdown.subscribe()));

    termination.await;
    let begun = Instant::now();

    match collector.terminate().await {
        Ok(report) if report.is_complete() => {
            tracing::info!(deleted = report.deleted.len(), "Canary pool drained");
        }
        Ok(report) => {
            tracing::warn!(
                deleted = report.deleted.len(),
                failed = report.failed.len(),
                "Canary pool drained with failures"
            );
        }
        Err(SchedulerError::TerminateDeadline { waited, state }) => {
            let remaining = config.timeouts.hard_cap().saturating_sub(begun.elapsed());
            tracing::warn!(
                waited_ms = waited.as_millis() as u64,
                %state,
                remaining_ms = remaining.as_millis() as u64,
                "Cleanup still running, waiting out the hard cap"
            );
            if let Err(err) = collector.wait_terminated(remaining).await {
                tracing::error!(error = %err, "Giving up on cleanup");
            }
        }
        Err(err) => tracing::error!(error = %err, "Termination failed"),
    }

    shutdown.trigger();
    http.await??;
    Ok(())
}
