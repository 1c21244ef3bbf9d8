// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared types flowing through the authentication and delivery pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provider-specific login material plus the path to post it to.
///
/// Produced fresh on every authentication attempt and never persisted.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Login endpoint path relative to the service root, e.g.
    /// `auth/jwt/login`.
    pub path: String,
    /// Provider-specific login payload, e.g. `{"role": "...", "jwt": "..."}`.
    pub payload: serde_json::Value,
}

/// Result of a login or renew call against the secrets service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// The access token. Never logged, never written to disk unencrypted
    /// except through an explicitly unencrypted sink.
    pub token: String,

    /// Opaque reference to the token, safe to log.
    #[serde(default)]
    pub accessor: Option<String>,

    /// Validity window granted by the service.
    #[serde(with = "duration_secs")]
    pub lease_duration: Duration,

    /// Whether the lease can be extended via renew-self.
    #[serde(default)]
    pub renewable: bool,

    /// Present instead of a usable `token` when the caller requested
    /// response wrapping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_info: Option<WrapInfo>,
}

/// A single-use wrapping token covering a value stored in the service.
///
/// Valid for exactly one unwrap call within `ttl`; a second unwrap attempt
/// fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapInfo {
    /// The single-use wrap token.
    pub token: String,

    /// How long the wrap token stays redeemable.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,

    /// Service path that created the wrapping, e.g. `sys/wrapping/wrap`.
    pub creation_path: String,
}

/// Serde helper serializing a [`Duration`] as whole seconds, matching the
/// service's integer lease and TTL fields.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}
