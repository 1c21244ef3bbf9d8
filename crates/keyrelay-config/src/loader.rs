// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order: compiled defaults, then an explicit TOML file, then
//! `KEYRELAY_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KeyrelayConfig;

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KeyrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyrelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no file, no env).
///
/// Used for testing and explicit inline configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<KeyrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyrelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from defaults and environment only.
pub fn load_config() -> Result<KeyrelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KeyrelayConfig::default()))
        .merge(Toml::file("keyrelay.toml"))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` so underscore-containing
/// key names stay unambiguous: `KEYRELAY_AUTH_MOUNT_PATH` must map to
/// `auth.mount_path`, not `auth.mount.path`.
fn env_provider() -> Env {
    Env::prefixed("KEYRELAY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("service_", "service.", 1)
            .replacen("auth_retry_", "auth.retry.", 1)
            .replacen("auth_", "auth.", 1);
        mapped.into()
    })
}
