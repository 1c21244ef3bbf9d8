// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential provider trait: the identity-side boundary of the pipeline.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::ProviderError;
use crate::types::Credential;

/// Produces provider-specific login material on demand.
///
/// Implementations read fresh credentials for every call; the auth handler
/// never caches them. New provider variants are added by implementing this
/// trait, not by modifying the pipeline.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Human-readable provider name, used in logs.
    fn name(&self) -> &str;

    /// Produce fresh login material.
    ///
    /// Fails with [`ProviderError`] when fresh credentials cannot be
    /// produced (missing file, unusable source). The handler retries with
    /// backoff.
    async fn credentials(&self) -> Result<Credential, ProviderError>;

    /// Optional push-based re-authentication trigger.
    ///
    /// Providers that can observe new credential material (for example a
    /// rotated JWT file) return a watch receiver whose value changes when
    /// re-authentication should happen. Providers without a push source
    /// return `None` and the handler relies on lease-driven timing alone;
    /// the handler substitutes a never-firing source, so no separate code
    /// path exists.
    fn signal(&self) -> Option<watch::Receiver<u64>> {
        None
    }

    /// Release provider resources (background pollers, file handles).
    async fn shutdown(&self) {}
}
