// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response shapes for the secrets service HTTP API.

use serde::Deserialize;

use keyrelay_core::types::{Secret, WrapInfo};
use keyrelay_core::ServiceError;

/// Envelope around every service response the pipeline cares about.
#[derive(Debug, Deserialize)]
pub struct ServiceResponse {
    /// Present on login and renew responses.
    #[serde(default)]
    pub auth: Option<AuthBlock>,

    /// Present when the call was response-wrapped.
    #[serde(default)]
    pub wrap_info: Option<WrapInfoWire>,

    /// Present on unwrap responses.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// The auth block of a login or renew response.
#[derive(Debug, Deserialize)]
pub struct AuthBlock {
    pub client_token: String,
    #[serde(default)]
    pub accessor: Option<String>,
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Wire shape of wrap info, seconds-based TTL.
#[derive(Debug, Deserialize)]
pub struct WrapInfoWire {
    pub token: String,
    pub ttl: u64,
    pub creation_path: String,
}

impl From<WrapInfoWire> for WrapInfo {
    fn from(w: WrapInfoWire) -> Self {
        WrapInfo {
            token: w.token,
            ttl: std::time::Duration::from_secs(w.ttl),
            creation_path: w.creation_path,
        }
    }
}

/// Error body the service returns on non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ServiceResponse {
    /// Convert a login/renew response into a [`Secret`].
    pub fn into_secret(self) -> Result<Secret, ServiceError> {
        if let Some(wrap) = self.wrap_info {
            // A wrapped login carries no usable token of its own.
            return Ok(Secret {
                token: String::new(),
                accessor: None,
                lease_duration: std::time::Duration::from_secs(wrap.ttl),
                renewable: false,
                wrap_info: Some(wrap.into()),
            });
        }

        let auth = self
            .auth
            .ok_or_else(|| ServiceError::Malformed("response missing auth block".into()))?;

        Ok(Secret {
            token: auth.client_token,
            accessor: auth.accessor,
            lease_duration: std::time::Duration::from_secs(auth.lease_duration),
            renewable: auth.renewable,
            wrap_info: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_parses_into_secret() {
        let body = r#"{
            "auth": {
                "client_token": "s.abc",
                "accessor": "acc",
                "lease_duration": 300,
                "renewable": true
            }
        }"#;

        let resp: ServiceResponse = serde_json::from_str(body).unwrap();
        let secret = resp.into_secret().unwrap();
        assert_eq!(secret.token, "s.abc");
        assert_eq!(secret.lease_duration.as_secs(), 300);
        assert!(secret.renewable);
    }

    #[test]
    fn wrapped_response_carries_wrap_info_only() {
        let body = r#"{
            "wrap_info": {
                "token": "hvs.wrap",
                "ttl": 10,
                "creation_path": "sys/wrapping/wrap"
            }
        }"#;

        let resp: ServiceResponse = serde_json::from_str(body).unwrap();
        let secret = resp.into_secret().unwrap();
        assert!(secret.token.is_empty());
        assert_eq!(secret.wrap_info.unwrap().token, "hvs.wrap");
    }

    #[test]
    fn missing_auth_block_is_malformed() {
        let resp: ServiceResponse = serde_json::from_str("{}").unwrap();
        let err = resp.into_secret().unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }

    #[test]
    fn error_body_tolerates_missing_errors_array() {
        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert!(body.errors.is_empty());
    }
}
