// SPDX-FileCopyrightText: 2026 Keyrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations with associated data.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the
//! system CSPRNG. Nonce reuse under the same derived key would be
//! catastrophic for GCM security.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{DecryptionError, KeyExchangeError};
use crate::keys::SharedKey;

/// Encrypt plaintext with AES-256-GCM, binding `aad` into the tag.
///
/// Returns `(ciphertext_with_tag, nonce_bytes)`. The caller must transport
/// both alongside the sender's public key for the reader to decrypt.
pub fn seal(
    key: &SharedKey,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), KeyExchangeError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| KeyExchangeError::Seal("failed to create AES-256-GCM key".into()))?;
    let less_safe = LessSafeKey::new(unbound);

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| KeyExchangeError::Rng)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    // Seal in place: the buffer is extended with the authentication tag.
    let mut in_out = plaintext.to_vec();
    less_safe
        .seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| KeyExchangeError::Seal("AES-256-GCM encryption failed".into()))?;

    Ok((in_out, nonce_bytes))
}

/// Decrypt ciphertext sealed by [`seal`], verifying `aad`.
///
/// `ciphertext` must include the 16-byte authentication tag. Fails without
/// returning any plaintext bytes on tag mismatch, truncation, or a
/// malformed nonce.
pub fn open(
    key: &SharedKey,
    nonce_bytes: &[u8],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let nonce_arr: [u8; NONCE_LEN] =
        nonce_bytes
            .try_into()
            .map_err(|_| DecryptionError::MalformedNonce {
                expected: NONCE_LEN,
                got: nonce_bytes.len(),
            })?;

    let tag_len = AES_256_GCM.tag_len();
    if ciphertext.len() < tag_len {
        return Err(DecryptionError::Truncated {
            len: ciphertext.len(),
            tag_len,
        });
    }

    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| DecryptionError::TagMismatch)?;
    let less_safe = LessSafeKey::new(unbound);
    let nonce = Nonce::assume_unique_for_key(nonce_arr);

    let mut in_out = ciphertext.to_vec();
    let plaintext = less_safe
        .open_in_place(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| DecryptionError::TagMismatch)?;

    Ok(plaintext.to_vec())
}
