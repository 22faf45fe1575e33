//! Sealing key derivation.
//!
//! Sealing keys are derived with Argon2id from the machine identity and a
//! fixed application salt. The license key never participates, so the same
//! sealed format works before any license exists.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Sealing key length (ChaCha20 takes 256-bit keys).
pub const KEY_SIZE: usize = 32;

/// Length of the key fingerprint written into envelope headers.
pub const KEY_ID_SIZE: usize = 8;

/// Application salt for machine-bound keys.
pub const APP_SALT: [u8; 16] = *b"progate.cache.v1";

const KEY_ID_DOMAIN: &[u8] = b"progate.key-id";

/// A symmetric sealing key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealingKey([u8; KEY_SIZE]);

impl SealingKey {
    /// Derives the key for a machine identity with [`KdfParams::machine`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyDerivation`] if Argon2 rejects its inputs.
    pub fn for_machine(machine_identity: &str) -> CryptoResult<Self> {
        derive_key(machine_identity.as_bytes(), &APP_SALT, &KdfParams::machine())
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// A fresh key from the thread-local CSPRNG.
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Short, non-secret fingerprint of this key.
    ///
    /// Lets an envelope sealed under another key be told apart from a
    /// damaged one without attempting decryption.
    pub fn key_id(&self) -> [u8; KEY_ID_SIZE] {
        let digest = Sha256::new()
            .chain_update(KEY_ID_DOMAIN)
            .chain_update(self.0)
            .finalize();
        let mut id = [0u8; KEY_ID_SIZE];
        id.copy_from_slice(&digest[..KEY_ID_SIZE]);
        id
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SealingKey").field(&"[REDACTED]").finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::machine()
    }
}

impl KdfParams {
    /// Cost for machine-bound keys.
    ///
    /// The input is a high-entropy machine digest, not a password, and
    /// derivation runs once per process on the first feature check.
    pub const fn machine() -> Self {
        Self {
            memory_kib: 2 * 1024,
            iterations: 1,
            lanes: 1,
        }
    }
}

/// Derives a sealing key from `secret` and `salt` with Argon2id.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] for out-of-range parameters or a
/// salt shorter than 8 bytes.
pub fn derive_key(secret: &[u8], salt: &[u8], params: &KdfParams) -> CryptoResult<SealingKey> {
    let argon2_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.lanes,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let mut bytes = [0u8; KEY_SIZE];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
        .hash_password_into(secret, salt, &mut bytes)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let key = SealingKey(bytes);
    bytes.zeroize();
    Ok(key)
}
