// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the keyrelay agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level keyrelay configuration.
///
/// Loaded from a TOML file with `KEYRELAY_*` environment variable
/// overrides. All sections default to sensible values except the sinks,
/// which must be configured explicitly.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeyrelayConfig {
    /// Agent identity and logging settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Secrets service connection settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Authentication method and retry policy.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Token delivery destinations.
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Agent identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent, used in logs.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

/// Secrets service connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Base address of the secrets service, e.g. `https://secrets.internal:8200`.
    #[serde(default = "default_service_address")]
    pub address: String,

    /// Deadline for every outbound service call, in seconds.
    #[serde(default = "default_service_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional namespace sent with every request, for services that
    /// partition their API by tenant.
    #[serde(default)]
    pub namespace: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            address: default_service_address(),
            timeout_secs: default_service_timeout_secs(),
            namespace: None,
        }
    }
}

/// Which credential provider feeds the auth handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethodKind {
    /// Read a platform-mounted workload identity token file.
    WorkloadIdentity,
    /// Read a signed JWT from a configured path, watching it for rotation.
    JwtFile,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Credential provider variant.
    #[serde(default = "default_auth_method")]
    pub method: AuthMethodKind,

    /// Auth mount path on the service, e.g. `auth/jwt`.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// Role to authenticate as.
    #[serde(default)]
    pub role: String,

    /// Path to the credential source file. For `workload_identity` this
    /// defaults to the platform mount; `jwt_file` requires it.
    #[serde(default)]
    pub credentials_path: Option<String>,

    /// How often the jwt_file provider polls its source for rotation, in
    /// seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Fraction of the lease after which renewal is attempted. Must be
    /// strictly between 0 and 1.
    #[serde(default = "default_lease_fraction")]
    pub lease_fraction: f64,

    /// Retry and backoff policy for login and renewal failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: default_auth_method(),
            mount_path: default_mount_path(),
            role: String::new(),
            credentials_path: None,
            poll_interval_secs: default_poll_interval_secs(),
            lease_fraction: default_lease_fraction(),
            retry: RetryConfig::default(),
        }
    }
}

/// Backoff and retry budget for authentication failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// First backoff interval after a failure, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling, in milliseconds. Once the budget is exhausted the
    /// handler keeps retrying at this interval; it never gives up.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Number of doubling steps before the backoff pins to the ceiling.
    /// 0 means start at the ceiling immediately.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Whether a renewal failure resumes the login backoff sequence where
    /// it left off (`true`) or restarts it (`false`).
    #[serde(default)]
    pub renewal_shares_budget: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_retries: default_max_retries(),
            renewal_shares_budget: false,
        }
    }
}

/// One token delivery destination.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Destination file path. Must be absolute.
    pub path: String,

    /// Unix permission bits for the written file.
    #[serde(default = "default_sink_mode")]
    pub mode: u32,

    /// Response-wrap the token with this TTL (seconds) before delivery.
    /// Absent means deliver the raw token payload.
    #[serde(default)]
    pub wrap_ttl_secs: Option<u64>,

    /// Path to a JSON file holding the consumer's X25519 public key.
    /// Present enables envelope encryption for this sink.
    #[serde(default)]
    pub peer_public_key_path: Option<String>,

    /// Associated data bound into the envelope's authentication tag.
    #[serde(default)]
    pub aad: String,
}

fn default_agent_name() -> String {
    "keyrelay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_address() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_service_timeout_secs() -> u64 {
    30
}

fn default_auth_method() -> AuthMethodKind {
    AuthMethodKind::WorkloadIdentity
}

fn default_mount_path() -> String {
    "auth/workload".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_lease_fraction() -> f64 {
    0.5
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    300_000
}

fn default_max_retries() -> u32 {
    8
}

fn default_sink_mode() -> u32 {
    0o640
}
