// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the keyrelay secrets agent.
//!
//! This crate provides the foundational trait definitions, error taxonomy,
//! and shared types used throughout the keyrelay workspace. Credential
//! providers, sinks, and service backends all implement traits defined
//! here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ProviderError, ServiceError, SinkError, WrapError};
pub use traits::{CredentialProvider, SecretsBackend, Sink};
pub use types::{Credential, Secret, WrapInfo};
