// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff with jitter for authentication retries.
//!
//! The handler never gives up: after `max_retries` doubling steps the
//! interval pins to the ceiling and retries continue indefinitely until
//! cancellation.

use std::time::Duration;

use rand::Rng;

/// Retry policy knobs, mapped from `[auth.retry]` configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// First interval after a failure.
    pub initial_backoff: Duration,
    /// Interval ceiling.
    pub max_backoff: Duration,
    /// Doubling steps before pinning to the ceiling.
    pub max_retries: u32,
    /// Whether renewal failures resume the login backoff sequence instead
    /// of restarting it.
    pub renewal_shares_budget: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            max_retries: 8,
            renewal_shares_budget: false,
        }
    }
}

/// Stateful backoff sequence: initial, doubled per failure, capped, with
/// +/-25% jitter to avoid thundering herds against a recovering service.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Next interval to wait before retrying.
    pub fn next_interval(&mut self) -> Duration {
        let base = self.base_interval();
        self.attempt = self.attempt.saturating_add(1);

        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        let jittered = base.mul_f64(jitter);
        jittered.min(self.policy.max_backoff)
    }

    /// Restart the sequence after a success. With a shared budget only a
    /// successful renewal counts; a login success alone does not.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    fn base_interval(&self) -> Duration {
        if self.attempt >= self.policy.max_retries {
            return self.policy.max_backoff;
        }
        let doubled = self
            .policy
            .initial_backoff
            .saturating_mul(1u32 << self.attempt.min(31));
        doubled.min(self.policy.max_backoff)
    }
}
