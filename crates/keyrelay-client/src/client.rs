// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the secrets service.
//!
//! Provides [`SecretsClient`], the concrete [`SecretsBackend`] used in
//! production. Every request carries the configured deadline so a hung
//! network call can never wedge the authentication loop.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use keyrelay_core::types::{Secret, WrapInfo};
use keyrelay_core::{SecretsBackend, ServiceError, WrapError};

use crate::wire::{ErrorBody, ServiceResponse};

/// Header carrying the access token on authenticated calls.
const TOKEN_HEADER: &str = "X-Secrets-Token";

/// Header requesting response wrapping with the given TTL in seconds.
const WRAP_TTL_HEADER: &str = "X-Secrets-Wrap-TTL";

/// Header selecting the tenant namespace, when configured.
const NAMESPACE_HEADER: &str = "X-Secrets-Namespace";

/// Client construction failed.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid service address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid namespace {namespace:?}: not a valid header value")]
    Namespace { namespace: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// HTTP client for the secrets service API.
///
/// Holds the current access token behind a lock so the auth handler can
/// install a fresh token while the sink server issues wrap calls.
pub struct SecretsClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    token: RwLock<Option<String>>,
}

impl SecretsClient {
    /// Create a client for the service at `address` with a per-request
    /// deadline of `timeout`.
    pub fn new(address: &str, timeout: Duration) -> Result<Self, ClientError> {
        Self::with_namespace(address, timeout, None)
    }

    /// Like [`SecretsClient::new`], also attaching a tenant namespace
    /// header to every request.
    pub fn with_namespace(
        address: &str,
        timeout: Duration,
        namespace: Option<&str>,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(address).map_err(|source| ClientError::Address {
            address: address.to_string(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(ns) = namespace {
            let value = HeaderValue::from_str(ns).map_err(|_| ClientError::Namespace {
                namespace: ns.to_string(),
            })?;
            headers.insert(NAMESPACE_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url,
            timeout,
            token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(&format!("v1/{}", path.trim_start_matches('/')))
            .map_err(|e| ServiceError::Malformed(format!("invalid endpoint path {path}: {e}")))
    }

    fn current_token(&self) -> Result<String, ServiceError> {
        self.token
            .read()
            .expect("token lock poisoned")
            .clone()
            .ok_or(ServiceError::NoToken)
    }

    fn map_transport(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout)
        } else {
            ServiceError::Transport(Box::new(e))
        }
    }

    /// Execute a POST and decode success or the service's error body.
    async fn post(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
        wrap_ttl: Option<Duration>,
    ) -> Result<ServiceResponse, ServiceError> {
        let url = self.endpoint(path)?;
        let mut req = self.http.post(url);
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(token) = token {
            req = req.header(TOKEN_HEADER, token);
        }
        if let Some(ttl) = wrap_ttl {
            req = req.header(WRAP_TTL_HEADER, ttl.as_secs().to_string());
        }

        let response = req.send().await.map_err(|e| self.map_transport(e))?;
        let status = response.status();
        debug!(%status, path, "service response received");

        if status.is_success() {
            return response
                .json::<ServiceResponse>()
                .await
                .map_err(|e| ServiceError::Malformed(e.to_string()));
        }

        let errors = response
            .json::<ErrorBody>()
            .await
            .map(|b| b.errors)
            .unwrap_or_default();
        warn!(%status, path, ?errors, "service rejected request");
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            errors,
        })
    }
}

/// Classify a wrap-endpoint rejection into the caller-facing taxonomy.
///
/// The service reports a consumed or expired wrap token as a client error
/// mentioning the wrapping token; an explicit expiry mention wins.
pub(crate) fn classify_unwrap_rejection(status: u16, errors: &[String]) -> Option<WrapError> {
    if !matches!(
        StatusCode::from_u16(status),
        Ok(StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::FORBIDDEN)
    ) {
        return None;
    }
    let joined = errors.join(" ").to_lowercase();
    if joined.contains("expired") {
        Some(WrapError::Expired)
    } else if joined.contains("wrapping token") {
        Some(WrapError::AlreadyUnwrapped)
    } else {
        None
    }
}

#[async_trait]
impl SecretsBackend for SecretsClient {
    async fn login(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<Secret, ServiceError> {
        self.post(path, Some(&payload), None, None)
            .await?
            .into_secret()
    }

    async fn renew_self(&self, increment: Duration) -> Result<Secret, ServiceError> {
        let token = self.current_token()?;
        let body = serde_json::json!({ "increment": increment.as_secs() });
        self.post("auth/token/renew-self", Some(&body), Some(&token), None)
            .await?
            .into_secret()
    }

    async fn wrap(
        &self,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<WrapInfo, WrapError> {
        let token = self.current_token()?;
        let response = self
            .post("sys/wrapping/wrap", Some(&value), Some(&token), Some(ttl))
            .await?;
        response
            .wrap_info
            .map(Into::into)
            .ok_or_else(|| {
                WrapError::Service(ServiceError::Malformed(
                    "wrap response missing wrap_info".into(),
                ))
            })
    }

    async fn unwrap(&self, token: &str) -> Result<serde_json::Value, WrapError> {
        // The wrap token itself authenticates the unwrap call.
        let result = self.post("sys/wrapping/unwrap", None, Some(token), None).await;
        match result {
            Ok(response) => response.data.ok_or_else(|| {
                WrapError::Service(ServiceError::Malformed(
                    "unwrap response missing data".into(),
                ))
            }),
            Err(ServiceError::Rejected { status, errors }) => {
                match classify_unwrap_rejection(status, &errors) {
                    Some(wrap_err) => Err(wrap_err),
                    None => Err(WrapError::Service(ServiceError::Rejected { status, errors })),
                }
            }
            Err(other) => Err(WrapError::Service(other)),
        }
    }

    fn set_token(&self, token: String) {
        *self.token.write().expect("token lock poisoned") = Some(token);
    }
}
