//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Control-plane call from the pool:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On elapsed deadline: ControlPlaneError::Timeout (transient)
//!     → Next tick re-attempts; nothing is retried in place
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries at the protocol level belong to the client library

pub mod timeouts;

pub use timeouts::TimeoutControlPlane;
