//! Immutable pool policy.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::config::validation::{check_pool, check_template, join_errors, ValidationError};
use crate::config::PoolConfig;
use crate::controlplane::{Selector, UnitSpec};

/// A policy that must not be used; raised before any control-plane call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid pool policy: {}", join_errors(.errors))]
pub struct ConfigurationError {
    pub errors: Vec<ValidationError>,
}

/// What each canary looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTemplate {
    pub name_prefix: String,
    pub image: String,
    /// Stamped on every unit and used as the ownership selector.
    pub labels: BTreeMap<String, String>,
}

impl Default for UnitTemplate {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            name_prefix: pool.name_prefix,
            image: pool.image,
            labels: pool.labels,
        }
    }
}

/// Desired count, TTL and cadence of the canary pool.
#[derive(Debug, Clone)]
pub struct PoolPolicy {
    namespace: String,
    desired_count: usize,
    ttl: Duration,
    ttl_delta: TimeDelta,
    poll_interval: Duration,
    template: UnitTemplate,
}

impl PoolPolicy {
    /// Validate and build a policy with the default unit template.
    pub fn new(
        namespace: impl Into<String>,
        desired_count: usize,
        ttl: Duration,
        poll_interval: Duration,
    ) -> Result<Self, ConfigurationError> {
        let namespace = namespace.into();
        let mut errors = check_pool(&namespace, desired_count, ttl, poll_interval);

        let ttl_delta = match TimeDelta::from_std(ttl) {
            Ok(delta) => delta,
            Err(_) => {
                errors.push(ValidationError::TtlOutOfRange(ttl));
                TimeDelta::zero()
            }
        };

        if !errors.is_empty() {
            return Err(ConfigurationError { errors });
        }

        Ok(Self {
            namespace,
            desired_count,
            ttl,
            ttl_delta,
            poll_interval,
            template: UnitTemplate::default(),
        })
    }

    pub fn from_config(config: &PoolConfig) -> Result<Self, ConfigurationError> {
        let template = UnitTemplate {
            name_prefix: config.name_prefix.clone(),
            image: config.image.clone(),
            labels: config.labels.clone(),
        };
        let built = Self::new(
            config.namespace.clone(),
            config.desired_count,
            Duration::from_secs(config.ttl_secs),
            Duration::from_secs(config.poll_interval_secs),
        );

        match built {
            Ok(policy) => policy.with_template(template),
            Err(mut err) => {
                err.errors.extend(check_template(
                    &template.name_prefix,
                    &template.image,
                    &template.labels,
                ));
                Err(err)
            }
        }
    }

    /// Replace the unit template; its labels become the ownership selector,
    /// so an empty label set is rejected.
    pub fn with_template(mut self, template: UnitTemplate) -> Result<Self, ConfigurationError> {
        let errors = check_template(&template.name_prefix, &template.image, &template.labels);
        if !errors.is_empty() {
            return Err(ConfigurationError { errors });
        }
        self.template = template;
        Ok(self)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn desired_count(&self) -> usize {
        self.desired_count
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn ttl_delta(&self) -> TimeDelta {
        self.ttl_delta
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn template(&self) -> &UnitTemplate {
        &self.template
    }

    pub fn selector(&self) -> Selector {
        Selector::new(self.template.labels.clone())
    }

    /// Creation request for one new canary.
    pub fn unit_spec(&self, now: DateTime<Utc>) -> UnitSpec {
        UnitSpec {
            namespace: self.namespace.clone(),
            name_prefix: self.template.name_prefix.clone(),
            image: self.template.image.clone(),
            labels: self.template.labels.clone(),
            created_at: now,
        }
    }
}
