//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (flags and KHEALTH_RCSCHEDULER_* env overlay)
//!     → validation.rs (semantic checks)
//!     → SchedulerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::ClientConfig;
pub use schema::ClientMode;
pub use schema::PoolConfig;
pub use schema::SchedulerConfig;
pub use schema::TimeoutConfig;
