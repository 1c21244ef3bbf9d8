// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits at the pipeline's seams.

pub mod backend;
pub mod provider;
pub mod sink;

pub use backend::SecretsBackend;
pub use provider::CredentialProvider;
pub use sink::Sink;
