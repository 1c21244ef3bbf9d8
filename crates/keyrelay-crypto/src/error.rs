// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for key exchange and envelope encryption.
//!
//! These are non-retryable for the delivery they occur in: a failed key
//! exchange or a decryption failure indicates misconfiguration or
//! tampering and must be surfaced loudly, never silently skipped.

use thiserror::Error;

/// Key generation or shared-key derivation failed.
#[derive(Debug, Error)]
pub enum KeyExchangeError {
    /// The peer public key was not 32 bytes of valid X25519 key material.
    #[error("malformed peer public key: {0}")]
    MalformedPeerKey(String),

    /// The peer public key is a low-order point; the exchange would
    /// produce an all-zero shared secret.
    #[error("peer public key is non-contributory (low-order point)")]
    NonContributory,

    /// The system CSPRNG failed.
    #[error("failed to draw randomness from the system CSPRNG")]
    Rng,

    /// AEAD sealing failed (key setup or encryption).
    #[error("authenticated encryption failed: {0}")]
    Seal(String),
}

/// Authenticated decryption failed. Must not leak partial plaintext.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptionError {
    /// Authentication tag mismatch: wrong key, wrong AAD, or tampering.
    #[error("authentication tag mismatch -- wrong key, wrong AAD, or tampered data")]
    TagMismatch,

    /// The ciphertext is shorter than the authentication tag.
    #[error("ciphertext truncated: {len} bytes is shorter than the {tag_len}-byte tag")]
    Truncated { len: usize, tag_len: usize },

    /// The nonce is not the expected 96 bits.
    #[error("malformed nonce: expected {expected} bytes, got {got}")]
    MalformedNonce { expected: usize, got: usize },

    /// The embedded sender public key could not be used for derivation.
    #[error("envelope key exchange failed: {0}")]
    KeyExchange(String),
}
