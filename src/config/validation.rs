//! Configuration validation.
//!
//! Serde handles syntax; this module checks values and cross-field rules.
//! Every problem is reported, not just the first one.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ControlPlaneConfig, RolloutStrategy};

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("service.config_id is required with the fixed rollout strategy and no spec_path")]
    MissingConfigId,

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ControlPlaneConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "service.name" });
    }
    if config.service.spec_path.is_none()
        && config.service.rollout_strategy == RolloutStrategy::Fixed
        && config.service.config_id.as_deref().map_or(true, str::is_empty)
    {
        errors.push(ValidationError::MissingConfigId);
    }
    if config.service.spec_path.is_none() {
        check_url(&mut errors, "service.management_url", &config.service.management_url);
    }
    if config.service.check_interval_secs == 0 {
        errors.push(ValidationError::Zero { field: "service.check_interval_secs" });
    }

    check_addr(&mut errors, "discovery.bind_address", &config.discovery.bind_address);
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.listener.address.is_empty() {
        errors.push(ValidationError::Empty { field: "listener.address" });
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::Zero { field: "listener.port" });
    }
    if config.backend.address.is_empty() {
        errors.push(ValidationError::Empty { field: "backend.address" });
    }
    if config.backend.port == 0 {
        errors.push(ValidationError::Zero { field: "backend.port" });
    }
    if config.backend.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "backend.connect_timeout_secs" });
    }

    check_url(&mut errors, "service_control.uri", &config.service_control.uri);
    check_url(&mut errors, "metadata.token_url", &config.metadata.token_url);
    if config.service_control.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "service_control.timeout_secs" });
    }
    if config.metadata.timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "metadata.timeout_secs" });
    }
    if config.timeouts.fetch_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.fetch_secs" });
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if url::Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}
