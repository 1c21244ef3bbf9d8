// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workload-identity credential provider.
//!
//! Reads a platform-mounted identity token file on every authentication
//! attempt and posts `{ role, jwt }` to the configured auth mount. No push
//! signal: the platform rotates the mount in place and the handler's
//! lease-driven re-authentication picks it up.

use std::path::PathBuf;

use async_trait::async_trait;

use keyrelay_core::types::Credential;
use keyrelay_core::{CredentialProvider, ProviderError};

/// Default mount location for the platform-provided identity token.
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/identity/token";

pub struct WorkloadIdentityProvider {
    mount_path: String,
    role: String,
    token_path: PathBuf,
}

impl WorkloadIdentityProvider {
    /// `mount_path` is the service auth mount (e.g. `auth/workload`);
    /// `token_path` overrides the platform default when set.
    pub fn new(
        mount_path: &str,
        role: &str,
        token_path: Option<PathBuf>,
    ) -> Result<Self, ProviderError> {
        if role.is_empty() {
            return Err(ProviderError::Config("role must not be empty".into()));
        }
        if mount_path.is_empty() {
            return Err(ProviderError::Config("mount path must not be empty".into()));
        }
        Ok(Self {
            mount_path: mount_path.trim_end_matches('/').to_string(),
            role: role.to_string(),
            token_path: token_path.unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
        })
    }
}

#[async_trait]
impl CredentialProvider for WorkloadIdentityProvider {
    fn name(&self) -> &str {
        "workload-identity"
    }

    async fn credentials(&self) -> Result<Credential, ProviderError> {
        let raw = tokio::fs::read_to_string(&self.token_path)
            .await
            .map_err(|source| ProviderError::Io {
                path: self.token_path.clone(),
                source,
            })?;

        let jwt = raw.trim();
        if jwt.is_empty() {
            return Err(ProviderError::Invalid(format!(
                "identity token file {} is empty",
                self.token_path.display()
            )));
        }

        Ok(Credential {
            path: format!("{}/login", self.mount_path),
            payload: serde_json::json!({
                "role": self.role,
                "jwt": jwt,
            }),
        })
    }
}
