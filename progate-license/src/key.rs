//! License key format checks and display masking.
//!
//! Keys use the format `PRO-XXXX-XXXX-XXXX-XXXX`: the fixed `PRO` prefix
//! followed by four groups of four uppercase ASCII letters or digits.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};

/// Fixed key prefix.
pub const KEY_PREFIX: &str = "PRO";

/// Number of groups after the prefix.
pub const KEY_GROUPS: usize = 4;

/// Characters per group.
pub const GROUP_LEN: usize = 4;

/// Character substituted for hidden key material.
pub const MASK_CHAR: char = '*';

/// Strict format check. Never panics; any deviation returns false.
#[must_use]
pub fn validate_key_format(key: &str) -> bool {
    let mut parts = key.split('-');
    if parts.next() != Some(KEY_PREFIX) {
        return false;
    }

    let mut groups = 0;
    for group in parts {
        groups += 1;
        if groups > KEY_GROUPS || group.len() != GROUP_LEN {
            return false;
        }
        if !group
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return false;
        }
    }
    groups == KEY_GROUPS
}

/// Renders a key with every group except the first and last masked,
/// e.g. `PRO-AB12-****-****-YZ90`. Display only.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let parts: Vec<&str> = key.split('-').collect();
    if parts.len() >= 4 {
        let last = parts.len() - 1;
        return parts
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if i <= 1 || i == last {
                    (*part).to_string()
                } else {
                    MASK_CHAR.to_string().repeat(part.chars().count())
                }
            })
            .collect::<Vec<_>>()
            .join("-");
    }

    // Not group-shaped: keep a short lead so the user can still recognize it.
    key.chars()
        .enumerate()
        .map(|(i, c)| if i < 4 { c } else { MASK_CHAR })
        .collect()
}

/// A license key that has passed [`validate_key_format`].
///
/// `Debug` and `Display` render the masked form so keys never reach logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LicenseKey {
    raw: String,
}

impl LicenseKey {
    /// Parses user input. Surrounding whitespace is trimmed and letters are
    /// uppercased before the strict check.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidKeyFormat`] if the key is malformed.
    pub fn parse(input: &str) -> LicenseResult<Self> {
        let normalized = input.trim().to_ascii_uppercase();
        if !validate_key_format(&normalized) {
            return Err(LicenseError::InvalidKeyFormat(format!(
                "expected {KEY_PREFIX}-XXXX-XXXX-XXXX-XXXX, got {}",
                mask_key(input.trim())
            )));
        }
        Ok(Self { raw: normalized })
    }

    /// Returns the full key string.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the masked display form.
    #[must_use]
    pub fn masked(&self) -> String {
        mask_key(&self.raw)
    }
}

impl TryFrom<String> for LicenseKey {
    type Error = LicenseError;

    fn try_from(value: String) -> LicenseResult<Self> {
        if validate_key_format(&value) {
            Ok(Self { raw: value })
        } else {
            Err(LicenseError::InvalidKeyFormat(mask_key(&value)))
        }
    }
}

impl From<LicenseKey> for String {
    fn from(key: LicenseKey) -> Self {
        key.raw
    }
}

impl std::fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.masked())
    }
}

impl std::fmt::Debug for LicenseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LicenseKey").field(&self.masked()).finish()
    }
}
