//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ttl above the poll interval)
//! - Check that the selected client mode has the arguments it needs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SchedulerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::{ClientConfig, ClientMode, PoolConfig, SchedulerConfig, TimeoutConfig};

/// A single semantic configuration problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("pool namespace must not be empty")]
    EmptyNamespace,

    #[error("pool namespace {0:?} is not a valid DNS label")]
    InvalidNamespace(String),

    #[error("pool desired count must be positive")]
    ZeroDesiredCount,

    #[error("poll interval must be positive")]
    ZeroPollInterval,

    #[error("ttl ({ttl:?}) must exceed poll interval ({poll_interval:?})")]
    TtlNotAboveInterval {
        ttl: Duration,
        poll_interval: Duration,
    },

    #[error("pool labels must not be empty; they scope which pods this process owns")]
    EmptySelector,

    #[error("pool name prefix must not be empty")]
    EmptyNamePrefix,

    #[error("pool image must not be empty")]
    EmptyImage,

    #[error("ttl of {0:?} is out of range")]
    TtlOutOfRange(Duration),

    #[error("client mode {mode} requires {argument}")]
    MissingClientArgument {
        mode: &'static str,
        argument: &'static str,
    },

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("timeout {0} must be positive")]
    ZeroTimeout(&'static str),

    #[error("terminate timeout ({terminate_secs}s) exceeds hard cap ({hard_cap_secs}s)")]
    TerminateExceedsHardCap {
        terminate_secs: u64,
        hard_cap_secs: u64,
    },
}

/// Validate the whole configuration.
pub fn validate_config(config: &SchedulerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    errors.extend(validate_pool(&config.pool));
    errors.extend(validate_client(&config.client));
    errors.extend(validate_timeouts(&config.timeouts));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the pool section.
pub fn validate_pool(pool: &PoolConfig) -> Vec<ValidationError> {
    let mut errors = check_pool(
        &pool.namespace,
        pool.desired_count,
        Duration::from_secs(pool.ttl_secs),
        Duration::from_secs(pool.poll_interval_secs),
    );
    errors.extend(check_template(&pool.name_prefix, &pool.image, &pool.labels));
    errors
}

/// Pool invariants, shared with `PoolPolicy` construction.
pub fn check_pool(
    namespace: &str,
    desired_count: usize,
    ttl: Duration,
    poll_interval: Duration,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if namespace.is_empty() {
        errors.push(ValidationError::EmptyNamespace);
    } else if !is_dns_label(namespace) {
        errors.push(ValidationError::InvalidNamespace(namespace.to_string()));
    }
    if desired_count == 0 {
        errors.push(ValidationError::ZeroDesiredCount);
    }
    if poll_interval.is_zero() {
        errors.push(ValidationError::ZeroPollInterval);
    }
    if ttl <= poll_interval {
        errors.push(ValidationError::TtlNotAboveInterval { ttl, poll_interval });
    }

    errors
}

/// Unit template checks, shared with `PoolPolicy::with_template`.
///
/// An empty label set would select every pod in the namespace.
pub fn check_template(
    name_prefix: &str,
    image: &str,
    labels: &BTreeMap<String, String>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if labels.is_empty() {
        errors.push(ValidationError::EmptySelector);
    }
    if name_prefix.is_empty() {
        errors.push(ValidationError::EmptyNamePrefix);
    }
    if image.is_empty() {
        errors.push(ValidationError::EmptyImage);
    }

    errors
}

fn validate_client(client: &ClientConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mode = client.mode.as_str();
    let mut require = |value: &Option<String>, argument: &'static str| {
        if value.as_deref().map(str::is_empty).unwrap_or(true) {
            errors.push(ValidationError::MissingClientArgument { mode, argument });
        }
    };

    match client.mode {
        ClientMode::InCluster => {}
        ClientMode::RemoteTls => {
            require(&client.remote_host, "remote_host");
            require(&client.tls_cert_file, "tls_cert_file");
            require(&client.tls_key_file, "tls_key_file");
        }
        ClientMode::RemoteBasicAuth => {
            require(&client.remote_host, "remote_host");
            require(&client.username, "username");
            require(&client.password, "password");
        }
    }

    errors
}

fn validate_timeouts(timeouts: &TimeoutConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, value) in [
        ("call_secs", timeouts.call_secs),
        ("terminate_secs", timeouts.terminate_secs),
        ("hard_cap_secs", timeouts.hard_cap_secs),
        ("request_secs", timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }
    if timeouts.terminate_secs > timeouts.hard_cap_secs {
        errors.push(ValidationError::TerminateExceedsHardCap {
            terminate_secs: timeouts.terminate_secs,
            hard_cap_secs: timeouts.hard_cap_secs,
        });
    }

    errors
}

/// Render a list of errors on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// RFC 1123 label: lowercase alphanumerics and '-', at most 63 chars,
/// starting and ending with an alphanumeric.
fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    bytes.iter().all(|b| edge_ok(b) || *b == b'-')
        && bytes.first().map(edge_ok).unwrap_or(false)
        && bytes.last().map(edge_ok).unwrap_or(false)
}
