//! Machine-bound sealed envelopes.
//!
//! Layout:
//!
//! ```text
//! magic "PGSB" | version (1) | key id (8) | nonce (12) | ciphertext + tag | sha256 (32)
//! ```
//!
//! The trailing checksum covers every preceding byte, so a flipped bit
//! anywhere is reported as [`CryptoError::Integrity`]. An intact envelope
//! whose key id differs from ours was sealed on another machine and is
//! reported as [`CryptoError::KeyMismatch`]. The header is bound to the
//! ciphertext as associated data.

use crate::cipher::{self, NONCE_SIZE, TAG_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{SealingKey, KEY_ID_SIZE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Envelope magic bytes.
pub const MAGIC: [u8; 4] = *b"PGSB";

/// Current envelope format version.
pub const FORMAT_VERSION: u8 = 1;

const HEADER_SIZE: usize = MAGIC.len() + 1 + KEY_ID_SIZE;
const CHECKSUM_SIZE: usize = 32;

/// Minimum size of a well-formed envelope (empty plaintext).
pub const MIN_SEALED_SIZE: usize = HEADER_SIZE + NONCE_SIZE + TAG_SIZE + CHECKSUM_SIZE;

/// Seals and opens byte payloads under a single machine-bound key.
#[derive(Clone, Debug)]
pub struct SealedBox {
    key: SealingKey,
    key_id: [u8; KEY_ID_SIZE],
}

impl SealedBox {
    /// Builds a box keyed to the given machine identity.
    pub fn for_identity(machine_identity: &str) -> CryptoResult<Self> {
        Ok(Self::with_key(SealingKey::for_machine(machine_identity)?))
    }

    /// Builds a box around an existing key.
    pub fn with_key(key: SealingKey) -> Self {
        let key_id = key.key_id();
        Self { key, key_id }
    }

    /// Encrypts and integrity-stamps `plaintext`.
    pub fn seal(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let header = self.header();
        let (nonce, ciphertext) = cipher::encrypt(&self.key, plaintext, &header)?;

        let mut out =
            Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + ciphertext.len() + CHECKSUM_SIZE);
        out.extend_from_slice(&header);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        let checksum = Sha256::digest(&out);
        out.extend_from_slice(&checksum);
        Ok(out)
    }

    /// Verifies and decrypts an envelope produced by [`SealedBox::seal`].
    pub fn open(&self, sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < MIN_SEALED_SIZE {
            return Err(CryptoError::Integrity(format!(
                "envelope too short ({} bytes)",
                sealed.len()
            )));
        }

        let (body, checksum) = sealed.split_at(sealed.len() - CHECKSUM_SIZE);
        if Sha256::digest(body).as_slice() != checksum {
            return Err(CryptoError::Integrity("checksum mismatch".to_string()));
        }

        let (header, rest) = body.split_at(HEADER_SIZE);
        if header[..MAGIC.len()] != MAGIC {
            return Err(CryptoError::Integrity("bad magic".to_string()));
        }
        let version = header[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(CryptoError::Integrity(format!(
                "unsupported envelope version {version}"
            )));
        }
        if header[MAGIC.len() + 1..] != self.key_id {
            return Err(CryptoError::KeyMismatch);
        }

        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        cipher::decrypt(&self.key, &nonce, ciphertext, header)
    }

    /// Serializes `value` as JSON and seals it.
    pub fn seal_json<T: Serialize>(&self, value: &T) -> CryptoResult<Vec<u8>> {
        let json = serde_json::to_vec(value)?;
        self.seal(&json)
    }

    /// Opens an envelope and parses its plaintext as JSON.
    pub fn open_json<T: DeserializeOwned>(&self, sealed: &[u8]) -> CryptoResult<T> {
        let plaintext = self.open(sealed)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn header(&self) -> [u8; HEADER_SIZE] {
        let mut header = [0u8; HEADER_SIZE];
        header[..MAGIC.len()].copy_from_slice(&MAGIC);
        header[MAGIC.len()] = FORMAT_VERSION;
        header[MAGIC.len() + 1..].copy_from_slice(&self.key_id);
        header
    }
}
