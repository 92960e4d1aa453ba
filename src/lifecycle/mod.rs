//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build client → Start collector → Serve /health
//!
//! Signals (signals.rs):
//!     SIGHUP/SIGINT/SIGTERM/SIGQUIT → terminate()
//!
//! Shutdown (shutdown.rs):
//!     Drain pool (deadline) → Wait out hard cap if needed → Stop HTTP → Exit
//!
//! State (state.rs):
//!     NotStarted → Running → Terminating → Terminated
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Shutdown has timeout: forced exit after the hard cap

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod state;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::SchedulerState;
