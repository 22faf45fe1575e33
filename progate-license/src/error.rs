//! Error types for the licensing module.

use crate::gate::LicenseState;
use progate_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable rejection codes returned by the license authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationErrorCode {
    /// Key is unknown to the authority.
    InvalidKey,
    /// Every seat on the license is in use.
    SeatLimitReached,
    /// License was revoked.
    Revoked,
    /// License subscription has ended.
    Expired,
    /// No activation exists for this key/machine pair.
    NotFound,
    /// The activation belongs to another machine.
    MachineMismatch,
    /// Too many requests.
    RateLimited,
    /// Any code this client does not recognize.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ActivationErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidKey => "invalid_key",
            Self::SeatLimitReached => "seat_limit_reached",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::NotFound => "not_found",
            Self::MachineMismatch => "machine_mismatch",
            Self::RateLimited => "rate_limited",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Malformed license key. Raised locally, never sent to the authority.
    #[error("invalid license key format: {0}")]
    InvalidKeyFormat(String),

    /// The authority rejected the request.
    #[error("license authority rejected the request ({code}): {details}")]
    Activation {
        code: ActivationErrorCode,
        details: String,
    },

    /// Sealed local state failed its integrity check.
    #[error("local license state is corrupt: {0}")]
    Integrity(String),

    /// Sealed local state was produced on another machine.
    #[error("local license state belongs to a different machine")]
    KeyMismatch,

    /// Authority unreachable or timed out.
    #[error("network error: {0}")]
    Network(String),

    /// No license is activated on this machine.
    #[error("license not activated")]
    NotActivated,

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CryptoError> for LicenseError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyMismatch => Self::KeyMismatch,
            CryptoError::Integrity(msg) => Self::Integrity(msg),
            CryptoError::Serialization(e) => Self::Serialization(e),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl LicenseError {
    /// Returns true for failures the host should absorb into offline behavior.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns the authority's rejection code, if any.
    #[must_use]
    pub fn activation_code(&self) -> Option<ActivationErrorCode> {
        match self {
            Self::Activation { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

/// Denial returned by [`crate::FeatureGate::require`].
///
/// Gated call sites treat this as "take the free path", never as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{friendly_name} requires an active Pro license ({feature_id}, license {state}). {hint}")]
pub struct ProFeatureError {
    /// The feature that was requested.
    pub feature_id: String,
    /// Human-facing feature name.
    pub friendly_name: String,
    /// License state at the time of the check.
    pub state: LicenseState,
    /// Remediation hint naming the reactivation command.
    pub hint: String,
}
