//! License validation and feature gating for progate.
//!
//! This crate handles:
//! - Key format checks and masking
//! - A machine-bound, sealed local license cache
//! - Online activation, revalidation and deactivation against the authority
//! - Offline decisions: active, grace and expired windows
//! - Queued deactivations when the authority is unreachable
//!
//! # Design Principles
//!
//! - **Local decisions**: feature checks read the local cache only and never
//!   touch the network
//! - **Fail closed for pro, open for core**: a missing, tampered or expired
//!   cache disables paid features and nothing else
//! - **No shared state**: the host owns the [`FeatureGate`] and passes it around
//!
//! # Files
//!
//! Under the data directory (default `~/.progate`): `license.cache`,
//! `pending-deactivation`, optionally `machine-id` and `license.toml`.

mod cache;
mod capability;
mod client;
mod clock;
mod config;
mod device;
mod error;
mod gate;
mod grant;
mod key;
mod pending;
mod record;
mod service;
mod store;

pub use cache::{CacheRead, LicenseCache, CACHE_FILE};
pub use capability::{CapabilitySet, ProCapability};
pub use client::{LicenseAuthority, ValidationResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    default_data_dir, LicenseConfig, AUTHORITY_URL_ENV, CONFIG_FILE, DEFAULT_AUTHORITY_URL,
    HOME_ENV,
};
pub use device::{DeviceInfo, MachineIdentity, FALLBACK_ID_FILE};
pub use error::{ActivationErrorCode, LicenseError, LicenseResult, ProFeatureError};
pub use gate::{CacheHealth, FeatureGate, GateStatus, LicenseState, DEFAULT_ACTIVATE_COMMAND};
pub use grant::{module_of, Grant, GrantSet};
pub use key::{mask_key, validate_key_format, LicenseKey, KEY_PREFIX};
pub use pending::{PendingDeactivation, PendingDeactivationTracker, PendingStatus, PENDING_FILE};
pub use record::{
    LicenseRecord, Seats, DEFAULT_CACHE_VALID_DAYS, DEFAULT_GRACE_PERIOD_DAYS,
};
pub use service::{
    DeactivateOutcome, LicenseService, LicenseStatusReport, PendingReport, ValidateOutcome,
};
pub use store::{quarantine_path, QUARANTINE_SUFFIX};

#[cfg(feature = "online")]
pub use client::HttpAuthority;
