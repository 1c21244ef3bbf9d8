// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! X25519 ephemeral keypairs and shared-key derivation.
//!
//! Each encrypted sink owns one [`KeyPair`], generated fresh at startup.
//! The private half never leaves the process; only the public half is
//! embedded in outgoing envelopes so the reader can derive the same key.

use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::KeyExchangeError;

/// A 256-bit symmetric key derived from an X25519 exchange.
///
/// Zeroized on drop so derived key material does not linger in freed
/// memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedKey(pub(crate) [u8; 32]);

impl SharedKey {
    /// Raw key bytes, for handing to the AEAD layer.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// An ephemeral X25519 keypair scoped to one sink instance.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half, as sent inside envelopes.
    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Derive the symmetric key shared with `peer_public`.
    ///
    /// Deterministic for the same two keys, so both sides derive the same
    /// key independently. The raw X25519 output is hashed with SHA-256
    /// before use as an AES-256 key.
    pub fn derive_shared_key(&self, peer_public: &[u8]) -> Result<SharedKey, KeyExchangeError> {
        derive_shared_key(&self.secret, peer_public)
    }

    /// Reconstruct a keypair from stored private key bytes.
    ///
    /// Only used by readers (the consuming side of an envelope), which
    /// hold their private key outside this process.
    pub fn from_private_bytes(private: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }
}

/// Derive a [`SharedKey`] from a private key and a peer's public key bytes.
///
/// Rejects peer keys of the wrong length and low-order points whose
/// exchange would yield a predictable all-zero secret.
pub fn derive_shared_key(
    secret: &StaticSecret,
    peer_public: &[u8],
) -> Result<SharedKey, KeyExchangeError> {
    let peer: [u8; 32] = peer_public.try_into().map_err(|_| {
        KeyExchangeError::MalformedPeerKey(format!(
            "expected 32 bytes, got {}",
            peer_public.len()
        ))
    })?;

    let shared = secret.diffie_hellman(&PublicKey::from(peer));
    if !shared.was_contributory() {
        return Err(KeyExchangeError::NonContributory);
    }

    let digest = Sha256::digest(shared.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    Ok(SharedKey(key))
}
