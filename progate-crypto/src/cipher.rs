//! ChaCha20-Poly1305 with caller-supplied associated data.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SealingKey;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

/// Nonce length (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag length appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// Encrypts `plaintext` under a fresh random nonce, binding `aad`.
///
/// Returns the nonce and the ciphertext with its tag appended.
pub fn encrypt(
    key: &SealingKey,
    plaintext: &[u8],
    aad: &[u8],
) -> CryptoResult<([u8; NONCE_SIZE], Vec<u8>)> {
    let nonce: [u8; NONCE_SIZE] = rand::random();
    let ciphertext = ChaCha20Poly1305::new(key.as_bytes().into())
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok((nonce, ciphertext))
}

/// Reverses [`encrypt`]. Any authentication failure is an integrity error.
pub fn decrypt(
    key: &SealingKey,
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> CryptoResult<Vec<u8>> {
    ChaCha20Poly1305::new(key.as_bytes().into())
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Integrity("authentication tag mismatch".to_string()))
}
