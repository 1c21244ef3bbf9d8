// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the keyrelay agent.
//!
//! TOML file plus `KEYRELAY_*` environment overrides, merged over compiled
//! defaults, followed by a semantic validation pass.

#![allow(clippy::result_large_err)] // figment::Error propagates through the loader API

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{AuthConfig, AuthMethodKind, KeyrelayConfig, RetryConfig, SinkConfig};
pub use validation::{validate, ConfigError};

use std::path::Path;

/// Load from `path` (or defaults plus env when `None`) and run the
/// serve-readiness validation pass from [`validate`].
///
/// Returns the validated config, or every problem found rendered as
/// strings so the binary can print them and exit. Callers that only need
/// a parse use the `load_config*` functions directly.
pub fn load_and_validate(path: Option<&Path>) -> Result<KeyrelayConfig, Vec<String>> {
    let config = match path {
        Some(p) => load_config_from_path(p),
        None => load_config(),
    }
    .map_err(|e| vec![e.to_string()])?;

    let errors = validate(&config);
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(errors.into_iter().map(|e| e.to_string()).collect())
    }
}
