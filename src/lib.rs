//! khealth canary scheduler library

pub mod canary;
pub mod config;
pub mod controlplane;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::SchedulerConfig;
pub use health::HealthCollector;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
