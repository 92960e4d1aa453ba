//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum, timeout / request-id / trace layers)
//!     → GET /health
//!     → HealthCollector::current_status
//!     → 200 or 503 with the snapshot as JSON
//! ```

pub mod server;

pub use server::{status_code_for, AppState, HttpServer};
