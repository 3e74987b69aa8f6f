//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint base paths (absolute, no trailing slash, unique)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BridgeConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one endpoint must be configured")]
    NoEndpoints,

    #[error("endpoint {name:?}: base path {path:?} must start with '/'")]
    RelativeBasePath { name: String, path: String },

    #[error("endpoint {name:?}: base path {path:?} must not end with '/'")]
    TrailingSlash { name: String, path: String },

    #[error("base path {0:?} is bound more than once")]
    DuplicateBasePath(String),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: {value:?} is not a socket address")]
    Address { field: &'static str, value: String },
}

pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }
    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        if !endpoint.base_path.starts_with('/') {
            errors.push(ValidationError::RelativeBasePath {
                name: endpoint.name.clone(),
                path: endpoint.base_path.clone(),
            });
        } else if endpoint.base_path.len() > 1 && endpoint.base_path.ends_with('/') {
            errors.push(ValidationError::TrailingSlash {
                name: endpoint.name.clone(),
                path: endpoint.base_path.clone(),
            });
        }
        if !seen.insert(endpoint.base_path.as_str()) {
            errors.push(ValidationError::DuplicateBasePath(endpoint.base_path.clone()));
        }
    }

    let limits = [
        ("listener.max_connections", config.listener.max_connections),
        ("session.max_message_bytes", config.session.max_message_bytes),
        ("session.outbound_queue", config.session.outbound_queue),
        ("timeouts.request_secs", config.timeouts.request_secs as usize),
    ];
    for (field, value) in limits {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let mut addresses = vec![("listener.bind_address", &config.listener.bind_address)];
    if config.observability.metrics_enabled {
        addresses.push(("observability.metrics_address", &config.observability.metrics_address));
    }
    if config.admin.enabled {
        addresses.push(("admin.bind_address", &config.admin.bind_address));
    }
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::Address {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
