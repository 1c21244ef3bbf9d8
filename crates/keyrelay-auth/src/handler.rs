// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authentication handler state machine.
//!
//! [`AuthHandler::run`] drives the credential provider and the service's
//! login/renew endpoints until cancelled, emitting each acquired
//! [`Secret`] on a capacity-1 channel. The single slot is the backpressure
//! mechanism: a new Secret cannot be produced until the delivery layer has
//! drained the previous one.
//!
//! States: Idle -> Authenticating -> Authenticated -> Renewing, falling
//! back to Authenticating on renewal failure and terminating only on
//! cancellation. Transient failures back off and retry forever; they are
//! reported through tracing, never by killing the process.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use keyrelay_core::types::Secret;
use keyrelay_core::{CredentialProvider, ProviderError, SecretsBackend, ServiceError};

use crate::backoff::{Backoff, RetryPolicy};

/// Channel capacity between the handler and the delivery layer. One slot
/// is the whole point: it is the backpressure mechanism.
pub const OUTPUT_CAPACITY: usize = 1;

/// Create the handler-to-delivery channel.
pub fn output_channel() -> (mpsc::Sender<Secret>, mpsc::Receiver<Secret>) {
    mpsc::channel(OUTPUT_CAPACITY)
}

/// One authentication attempt failed. Absorbed by the handler's backoff.
#[derive(Debug, Error)]
enum AuthAttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("login failed: {0}")]
    Login(#[from] ServiceError),

    #[error("service issued a token with a zero-length lease")]
    EmptyLease,
}

/// Handler configuration, mapped from `[auth]` settings.
#[derive(Debug, Clone)]
pub struct AuthHandlerConfig {
    /// Backoff policy for failed attempts.
    pub retry: RetryPolicy,
    /// Fraction of the lease to wait before renewing or re-authenticating.
    pub lease_fraction: f64,
}

impl Default for AuthHandlerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            lease_fraction: 0.5,
        }
    }
}

/// Owns the authenticate/renew/re-authenticate loop.
pub struct AuthHandler {
    backend: Arc<dyn SecretsBackend>,
    provider: Arc<dyn CredentialProvider>,
    config: AuthHandlerConfig,
    out: mpsc::Sender<Secret>,
}

impl AuthHandler {
    pub fn new(
        backend: Arc<dyn SecretsBackend>,
        provider: Arc<dyn CredentialProvider>,
        config: AuthHandlerConfig,
        out: mpsc::Sender<Secret>,
    ) -> Self {
        Self {
            backend,
            provider,
            config,
            out,
        }
    }

    /// Run until `cancel` fires. Consumes the handler; dropping the sender
    /// on exit closes the output channel, which is the delivery layer's
    /// completion signal.
    pub async fn run(self, cancel: CancellationToken) {
        info!(provider = self.provider.name(), "auth handler running");

        // A provider without a push source gets a receiver that never
        // fires; the sender must stay alive or changed() would return
        // immediately.
        let (never_tx, never_rx) = watch::channel(0u64);
        let mut signal = self.provider.signal().unwrap_or(never_rx);
        // Observing the current value now means only future rotations fire.
        signal.mark_unchanged();

        let mut backoff = Backoff::new(self.config.retry.clone());

        'authenticate: loop {
            // --- Authenticating ---
            let secret = loop {
                if cancel.is_cancelled() {
                    break 'authenticate;
                }
                match self.try_authenticate().await {
                    Ok(secret) => break secret,
                    Err(e) => {
                        let wait = backoff.next_interval();
                        warn!(
                            error = %e,
                            attempt = backoff.attempts(),
                            backoff = ?wait,
                            "authentication failed, backing off"
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => break 'authenticate,
                            _ = tokio::time::sleep(wait) => {}
                        }
                    }
                }
            };

            // A shared budget keeps the failure count across the login, so
            // a later renewal failure resumes the backoff sequence where it
            // left off instead of restarting it. Only a successful renewal
            // clears it.
            if !self.config.retry.renewal_shares_budget {
                backoff.reset();
            }
            self.backend.set_token(secret.token.clone());
            let mut lease = secret.lease_duration;
            let mut renewable = secret.renewable;
            info!(
                accessor = secret.accessor.as_deref().unwrap_or("-"),
                lease_secs = lease.as_secs(),
                renewable,
                "authentication succeeded"
            );

            // --- Emit (the backpressure point) ---
            tokio::select! {
                _ = cancel.cancelled() => break 'authenticate,
                sent = self.out.send(secret) => {
                    if sent.is_err() {
                        warn!("output channel closed, shutting down auth handler");
                        break 'authenticate;
                    }
                }
            }

            // --- Authenticated / Renewing ---
            loop {
                let wake = wake_after(lease, self.config.lease_fraction);
                debug!(wake = ?wake, "sleeping until renewal checkpoint");

                tokio::select! {
                    _ = cancel.cancelled() => break 'authenticate,
                    _ = tokio::time::sleep(wake) => {}
                    changed = signal.changed() => {
                        if changed.is_err() {
                            // Signal source gone: swap in a receiver that
                            // never fires and rely on lease timing alone.
                            debug!("provider signal source closed");
                            signal = never_tx.subscribe();
                            continue;
                        }
                        info!("credential provider signalled new material, re-authenticating");
                        continue 'authenticate;
                    }
                }

                if !renewable {
                    debug!("lease not renewable, re-authenticating");
                    continue 'authenticate;
                }

                match self.backend.renew_self(lease).await {
                    Ok(renewed) => {
                        backoff.reset();
                        lease = renewed.lease_duration;
                        renewable = renewed.renewable;
                        debug!(lease_secs = lease.as_secs(), "lease renewed");
                    }
                    Err(e) => {
                        warn!(error = %e, "renewal failed, falling back to re-authentication");
                        continue 'authenticate;
                    }
                }
            }
        }

        self.provider.shutdown().await;
        info!("auth handler shut down");
        // self.out drops here, closing the channel.
    }

    /// One full authentication attempt: fresh credentials, then login.
    async fn try_authenticate(&self) -> Result<Secret, AuthAttemptError> {
        let credential = self.provider.credentials().await?;
        let secret = self.backend.login(&credential.path, credential.payload).await?;

        // Never hand a dead-on-arrival token to the delivery layer.
        if secret.lease_duration.is_zero() {
            return Err(AuthAttemptError::EmptyLease);
        }
        Ok(secret)
    }
}

/// Renewal checkpoint: a safe fraction of the lease, floored so a
/// pathologically short lease cannot spin the loop hot.
fn wake_after(lease: Duration, fraction: f64) -> Duration {
    lease.mul_f64(fraction).max(Duration::from_secs(1))
}
