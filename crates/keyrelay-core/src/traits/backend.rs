// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secrets-service backend trait.
//!
//! The pipeline talks to the service exclusively through this trait so the
//! auth handler and sink server can be exercised against an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ServiceError, WrapError};
use crate::types::{Secret, WrapInfo};

/// The four service operations the pipeline depends on.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Authenticate with provider-produced login material.
    ///
    /// `path` is the auth mount's login endpoint; `payload` is the
    /// provider-specific body. On success the returned [`Secret`] carries
    /// the access token and its lease.
    async fn login(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<Secret, ServiceError>;

    /// Extend the current token's lease, requesting `increment` as the new
    /// lease duration. The token's identity never changes across renewals.
    async fn renew_self(&self, increment: Duration) -> Result<Secret, ServiceError>;

    /// Store `value` behind a single-use wrap token valid for `ttl`.
    async fn wrap(
        &self,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<WrapInfo, WrapError>;

    /// Redeem a wrap token, returning the stored value. Succeeds exactly
    /// once per token; a repeat or late call fails with
    /// [`WrapError::AlreadyUnwrapped`] or [`WrapError::Expired`].
    async fn unwrap(&self, token: &str) -> Result<serde_json::Value, WrapError>;

    /// Install the access token used for authenticated calls (renew, wrap).
    fn set_token(&self, token: String);
}
