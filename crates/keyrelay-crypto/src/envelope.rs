// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The envelope wire format for encrypted token delivery.
//!
//! An [`Envelope`] is the JSON structure written to encrypted sinks:
//! the sender's ephemeral public key, a fresh nonce, and the AEAD
//! ciphertext, all base64-encoded. The reader derives the shared key
//! independently from its own private key and the embedded public key.

use serde::{Deserialize, Serialize};

use crate::aead;
use crate::error::{DecryptionError, KeyExchangeError};
use crate::keys::{KeyPair, SharedKey};

/// One encrypted delivery, self-contained for an offline reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The sender's ephemeral X25519 public key.
    #[serde(with = "base64_bytes")]
    pub curve25519_public_key: Vec<u8>,

    /// 96-bit AES-GCM nonce, fresh per encryption.
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,

    /// AES-256-GCM ciphertext with the 16-byte tag appended.
    #[serde(with = "base64_bytes")]
    pub encrypted_payload: Vec<u8>,
}

impl Envelope {
    /// Encrypt `plaintext` for the holder of the private key matching
    /// `shared`, embedding `sender`'s public half so the reader can derive
    /// the same key.
    pub fn seal(
        sender: &KeyPair,
        shared: &SharedKey,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Self, KeyExchangeError> {
        let (encrypted_payload, nonce) = aead::seal(shared, plaintext, aad)?;
        Ok(Self {
            curve25519_public_key: sender.public_bytes().to_vec(),
            nonce: nonce.to_vec(),
            encrypted_payload,
        })
    }

    /// Decrypt with the reader's own keypair, deriving the shared key from
    /// the embedded sender public key.
    pub fn open(&self, reader: &KeyPair, aad: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        let shared = reader
            .derive_shared_key(&self.curve25519_public_key)
            .map_err(|e| DecryptionError::KeyExchange(e.to_string()))?;
        aead::open(&shared, &self.nonce, &self.encrypted_payload, aad)
    }
}

/// Serde helper encoding byte fields as standard base64 strings, matching
/// the envelope file format consumers already parse.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
