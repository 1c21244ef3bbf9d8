// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the keyrelay pipeline.
//!
//! Each concern gets its own enum so callers can match on exactly the
//! failures they are able to handle. Provider, login, and renew failures
//! are retryable and absorbed by the auth handler; wrap-token misuse is
//! surfaced to the unwrapping caller; sink failures are logged and retried
//! only by the next authentication cycle.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Credential acquisition failed. Retryable with backoff.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The credential source file could not be read.
    #[error("failed to read credential source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential source exists but holds unusable material.
    #[error("invalid credential material: {0}")]
    Invalid(String),

    /// Provider-specific misconfiguration (missing role, empty mount path).
    #[error("provider configuration error: {0}")]
    Config(String),
}

/// The secrets service rejected a call or the network failed.
///
/// Shared shape for login and renew failures; both are retryable with
/// backoff and never terminate the pipeline.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered with a non-success status.
    #[error("service rejected request (status {status}): {}", errors.join("; "))]
    Rejected { status: u16, errors: Vec<String> },

    /// The request never completed (connection refused, DNS, TLS).
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The configured deadline elapsed before the service answered.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body did not match the expected shape.
    #[error("malformed service response: {0}")]
    Malformed(String),

    /// The call requires an access token but none has been acquired yet.
    #[error("no access token available for authenticated call")]
    NoToken,
}

impl ServiceError {
    /// HTTP status of the rejection, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Wrap-token misuse or wrap/unwrap transport failure.
#[derive(Debug, Error)]
pub enum WrapError {
    /// The single-use wrap token was already redeemed.
    #[error("wrap token has already been unwrapped")]
    AlreadyUnwrapped,

    /// The wrap token's TTL elapsed before it was redeemed.
    #[error("wrap token expired before unwrap")]
    Expired,

    /// Underlying service call failed for another reason.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Local token delivery failed.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the payload to the destination failed.
    #[error("failed to write sink {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sink was constructed with an unusable destination.
    #[error("sink configuration error: {0}")]
    Config(String),
}
