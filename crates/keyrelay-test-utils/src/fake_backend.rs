// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory secrets-service fake for deterministic testing.
//!
//! `FakeBackend` implements `SecretsBackend` with scriptable failures and
//! a real single-use wrap store, enabling fast, CI-runnable tests without
//! a live service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use keyrelay_core::types::{Secret, WrapInfo};
use keyrelay_core::{SecretsBackend, ServiceError, WrapError};

struct WrapEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// A scriptable in-memory stand-in for the secrets service.
pub struct FakeBackend {
    lease: Duration,
    renewable: bool,
    login_count: AtomicU64,
    renew_count: AtomicU64,
    /// Remaining login attempts that should fail before one succeeds.
    failing_logins: AtomicU32,
    /// When set, every renew call fails.
    failing_renews: Mutex<bool>,
    current_token: Mutex<Option<String>>,
    wrap_counter: AtomicU64,
    wraps: Mutex<HashMap<String, WrapEntry>>,
}

impl FakeBackend {
    /// Backend issuing tokens with the given lease.
    pub fn new(lease: Duration, renewable: bool) -> Self {
        Self {
            lease,
            renewable,
            login_count: AtomicU64::new(0),
            renew_count: AtomicU64::new(0),
            failing_logins: AtomicU32::new(0),
            failing_renews: Mutex::new(false),
            current_token: Mutex::new(None),
            wrap_counter: AtomicU64::new(0),
            wraps: Mutex::new(HashMap::new()),
        }
    }

    /// Make the next `n` login attempts fail with a 503.
    pub fn fail_next_logins(&self, n: u32) {
        self.failing_logins.store(n, Ordering::SeqCst);
    }

    /// Toggle renewal failure.
    pub fn set_renews_failing(&self, failing: bool) {
        *self.failing_renews.lock().unwrap() = failing;
    }

    /// How many logins have succeeded or failed so far.
    pub fn login_attempts(&self) -> u64 {
        self.login_count.load(Ordering::SeqCst)
    }

    /// How many renew calls have been made so far.
    pub fn renew_attempts(&self) -> u64 {
        self.renew_count.load(Ordering::SeqCst)
    }

    /// The token most recently installed via `set_token`.
    pub fn installed_token(&self) -> Option<String> {
        self.current_token.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretsBackend for FakeBackend {
    async fn login(
        &self,
        _path: &str,
        payload: serde_json::Value,
    ) -> Result<Secret, ServiceError> {
        let attempt = self.login_count.fetch_add(1, Ordering::SeqCst) + 1;

        if payload.get("jwt").map(|v| v == "") == Some(true) {
            return Err(ServiceError::Rejected {
                status: 400,
                errors: vec!["missing jwt".into()],
            });
        }

        let remaining = self.failing_logins.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_logins.store(remaining - 1, Ordering::SeqCst);
            return Err(ServiceError::Rejected {
                status: 503,
                errors: vec!["service sealed".into()],
            });
        }

        Ok(Secret {
            token: format!("s.fake-{attempt}"),
            accessor: Some(format!("acc-{attempt}")),
            lease_duration: self.lease,
            renewable: self.renewable,
            wrap_info: None,
        })
    }

    async fn renew_self(&self, _increment: Duration) -> Result<Secret, ServiceError> {
        self.renew_count.fetch_add(1, Ordering::SeqCst);

        if *self.failing_renews.lock().unwrap() {
            return Err(ServiceError::Rejected {
                status: 403,
                errors: vec!["token not renewable or revoked".into()],
            });
        }

        let token = self
            .current_token
            .lock()
            .unwrap()
            .clone()
            .ok_or(ServiceError::NoToken)?;

        // Renewal refreshes the lease without changing the token identity.
        Ok(Secret {
            token,
            accessor: None,
            lease_duration: self.lease,
            renewable: self.renewable,
            wrap_info: None,
        })
    }

    async fn wrap(
        &self,
        value: serde_json::Value,
        ttl: Duration,
    ) -> Result<WrapInfo, WrapError> {
        if self.current_token.lock().unwrap().is_none() {
            return Err(WrapError::Service(ServiceError::NoToken));
        }

        let id = self.wrap_counter.fetch_add(1, Ordering::SeqCst);
        let token = format!("w.fake-{id}");
        self.wraps.lock().unwrap().insert(
            token.clone(),
            WrapEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(WrapInfo {
            token,
            ttl,
            creation_path: "sys/wrapping/wrap".into(),
        })
    }

    async fn unwrap(&self, token: &str) -> Result<serde_json::Value, WrapError> {
        let mut wraps = self.wraps.lock().unwrap();
        let entry = wraps.remove(token).ok_or(WrapError::AlreadyUnwrapped)?;
        if Instant::now() > entry.expires_at {
            return Err(WrapError::Expired);
        }
        Ok(entry.value)
    }

    fn set_token(&self, token: String) {
        *self.current_token.lock().unwrap() = Some(token);
    }
}
