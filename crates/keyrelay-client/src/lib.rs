// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secrets-service HTTP client for keyrelay.
//!
//! [`SecretsClient`] implements [`keyrelay_core::SecretsBackend`]: login,
//! renew-self, and the wrap/unwrap protocol. The wrap protocol stores a
//! value behind a single-use token; redeeming the token once returns the
//! value and permanently invalidates the token.

pub mod client;
pub mod wire;

pub use client::{ClientError, SecretsClient};
