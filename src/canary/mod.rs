//! Canary pool subsystem.
//!
//! # Data Flow
//! ```text
//! PoolPolicy (policy.rs):
//!     Validated namespace, desired count, TTL, poll interval
//!
//! PoolManager (pool.rs):
//!     Poll tick
//!     → list / read / create / delete through the ControlPlane port
//!     → update CanaryUnit records (unit.rs)
//!     → aggregate into a HealthSnapshot
//! ```
//!
//! # Design Decisions
//! - Policy is immutable once built; invalid policies never reach the port
//! - Hysteresis lives on the unit record, not in the manager
//! - TTL rotation wins over health: expired units go regardless of state

pub mod policy;
pub mod pool;
pub mod unit;

pub use policy::{ConfigurationError, PoolPolicy, UnitTemplate};
pub use pool::{DrainReport, PoolManager};
pub use unit::{CanaryUnit, UnitState, FAILURE_THRESHOLD};
