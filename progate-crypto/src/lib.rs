//! Machine-bound sealing for progate local state.
//!
//! Local license state is encrypted with ChaCha20-Poly1305 under a key derived
//! from the machine identity, then stamped with a checksum. Copying a sealed
//! file to another host yields [`CryptoError::KeyMismatch`]; flipping a byte
//! yields [`CryptoError::Integrity`].

mod cipher;
mod error;
mod key;
mod sealed;

pub use cipher::{decrypt, encrypt, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, KdfParams, SealingKey, APP_SALT, KEY_ID_SIZE, KEY_SIZE};
pub use sealed::{SealedBox, FORMAT_VERSION, MAGIC, MIN_SEALED_SIZE};
