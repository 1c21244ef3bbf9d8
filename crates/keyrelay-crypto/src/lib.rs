// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key exchange and envelope encryption for keyrelay token delivery.
//!
//! The delivery layer never writes a raw token to an encrypted sink.
//! Instead it performs an X25519 exchange against the sink's configured
//! peer public key, derives an AES-256 key, and seals the payload into an
//! [`Envelope`] with a fresh nonce and caller-supplied associated data.

pub mod aead;
pub mod envelope;
pub mod error;
pub mod keys;

pub use envelope::Envelope;
pub use error::{DecryptionError, KeyExchangeError};
pub use keys::{derive_shared_key, KeyPair, SharedKey};
