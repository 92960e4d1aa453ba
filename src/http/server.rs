//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the health handler
//! - Wire up middleware (timeout, request ID, tracing)
//! - Serve on a listener until the shutdown signal fires
//!
//! # Design Decisions
//! - The handler only reads the published snapshot; it never waits on a reconciliation
//! - Status code follows the verdict: 200 when serving, 503 otherwise

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::TimeoutConfig;
use crate::health::{HealthCollector, HealthSnapshot, Overall};
use crate::lifecycle::shutdown::ShutdownSignal;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<HealthCollector>,
}

/// HTTP server exposing the health verdict.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(timeouts: &TimeoutConfig, collector: Arc<HealthCollector>) -> Self {
        let router = Self::build_router(timeouts, AppState { collector });
        Self { router }
    }

    /// The fully layered router, for driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(timeouts: &TimeoutConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(timeouts.request()))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Status code reported for a verdict.
pub fn status_code_for(overall: Overall) -> StatusCode {
    if overall.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.collector.current_status();
    let status = status_code_for(snapshot.overall);

    tracing::debug!(overall = ?snapshot.overall, status = status.as_u16(), "Health requested");
    (status, Json(HealthSnapshot::clone(&snapshot))).into_response()
}
