// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic validation of a parsed configuration.
//!
//! Figment and serde catch shape errors; this pass catches values that
//! parse fine but cannot work at runtime, with messages naming the exact
//! key to fix.

use std::path::Path;

use thiserror::Error;

use crate::model::{AuthMethodKind, KeyrelayConfig};

/// One actionable configuration problem.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service.address must be an http(s) URL, got {0:?}")]
    ServiceAddress(String),

    #[error("auth.role must not be empty")]
    EmptyRole,

    #[error("auth.credentials_path is required for the jwt_file method")]
    MissingCredentialsPath,

    #[error("auth.lease_fraction must be strictly between 0 and 1, got {0}")]
    LeaseFraction(f64),

    #[error("auth.retry.initial_backoff_ms must not exceed max_backoff_ms ({initial} > {max})")]
    BackoffOrder { initial: u64, max: u64 },

    #[error("sinks[{index}].path must be absolute, got {path:?}")]
    RelativeSinkPath { index: usize, path: String },

    #[error("sinks[{index}].wrap_ttl_secs must be positive when set")]
    ZeroWrapTtl { index: usize },

    #[error("at least one sink must be configured")]
    NoSinks,
}

/// Validate a configuration for the `serve` command.
///
/// Returns every problem found, not just the first.
pub fn validate(config: &KeyrelayConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if !config.service.address.starts_with("http://")
        && !config.service.address.starts_with("https://")
    {
        errors.push(ConfigError::ServiceAddress(config.service.address.clone()));
    }

    if config.auth.role.is_empty() {
        errors.push(ConfigError::EmptyRole);
    }

    if config.auth.method == AuthMethodKind::JwtFile && config.auth.credentials_path.is_none() {
        errors.push(ConfigError::MissingCredentialsPath);
    }

    if !(config.auth.lease_fraction > 0.0 && config.auth.lease_fraction < 1.0) {
        errors.push(ConfigError::LeaseFraction(config.auth.lease_fraction));
    }

    if config.auth.retry.initial_backoff_ms > config.auth.retry.max_backoff_ms {
        errors.push(ConfigError::BackoffOrder {
            initial: config.auth.retry.initial_backoff_ms,
            max: config.auth.retry.max_backoff_ms,
        });
    }

    if config.sinks.is_empty() {
        errors.push(ConfigError::NoSinks);
    }

    for (index, sink) in config.sinks.iter().enumerate() {
        if !Path::new(&sink.path).is_absolute() {
            errors.push(ConfigError::RelativeSinkPath {
                index,
                path: sink.path.clone(),
            });
        }
        if sink.wrap_ttl_secs == Some(0) {
            errors.push(ConfigError::ZeroWrapTtl { index });
        }
    }

    errors
}
