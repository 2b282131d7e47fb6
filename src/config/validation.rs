//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the upstream target is a bare origin
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream target scheme must be http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("upstream target has no host")]
    MissingHost,

    #[error("upstream target must be a bare origin, found {0}")]
    NotAnOrigin(&'static str),

    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("cors.allowed_origin must not be empty")]
    EmptyAllowedOrigin,

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("listener.tls.{0} must not be empty")]
    EmptyTlsPath(&'static str),
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let target = &config.upstream.target;
    if !matches!(target.scheme(), "http" | "https") {
        errors.push(ValidationError::UnsupportedScheme(target.scheme().to_string()));
    }
    if target.host_str().map_or(true, str::is_empty) {
        errors.push(ValidationError::MissingHost);
    }
    if !matches!(target.path(), "" | "/") {
        errors.push(ValidationError::NotAnOrigin("a path"));
    }
    if target.query().is_some() {
        errors.push(ValidationError::NotAnOrigin("a query"));
    }
    if target.fragment().is_some() {
        errors.push(ValidationError::NotAnOrigin("a fragment"));
    }
    if !target.username().is_empty() || target.password().is_some() {
        errors.push(ValidationError::NotAnOrigin("credentials"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("cert_path"));
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::EmptyTlsPath("key_path"));
        }
    }

    if let Some(origin) = &config.cors.allowed_origin {
        if origin.trim().is_empty() {
            errors.push(ValidationError::EmptyAllowedOrigin);
        }
    }

    if config.timeouts.connect_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.idle_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout("idle_secs"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
