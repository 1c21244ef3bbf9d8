// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the keyrelay agent.
//!
//! The [`AuthHandler`] owns the authenticate/renew/re-authenticate loop,
//! driving a [`CredentialProvider`](keyrelay_core::CredentialProvider) and
//! the service's login endpoint, and emitting acquired tokens on a
//! single-slot channel toward the delivery layer.

pub mod backoff;
pub mod handler;
pub mod methods;

pub use backoff::{Backoff, RetryPolicy};
pub use handler::{output_channel, AuthHandler, AuthHandlerConfig, OUTPUT_CAPACITY};
pub use methods::{JwtFileProvider, WorkloadIdentityProvider};
