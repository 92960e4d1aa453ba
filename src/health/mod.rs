//! Health collection subsystem.
//!
//! # Data Flow
//! ```text
//! Poll loop (poll.rs):
//!     Timer tick
//!     → PoolManager::reconcile
//!     → publish into snapshot.rs
//!
//! Collector (collector.rs):
//!     start()          → spawn poll loop
//!     current_status() → read snapshot.rs
//!     terminate()      → signal poll loop → drain → Terminated
//! ```
//!
//! # Design Decisions
//! - One writer (the poll loop), any number of readers
//! - Snapshots are swapped whole, never mutated in place
//! - The lifecycle only moves forward

pub mod collector;
pub mod poll;
pub mod snapshot;

pub use collector::{HealthCollector, SchedulerError};
pub use snapshot::{HealthSnapshot, Overall, SnapshotCell};
