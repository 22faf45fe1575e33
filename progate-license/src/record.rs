//! The cached license record and its expiry arithmetic.
//!
//! The same JSON shape is used by the license authority and by the sealed
//! local cache.

use crate::key::LicenseKey;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Offline usability window when a record predates the field.
pub const DEFAULT_CACHE_VALID_DAYS: u32 = 30;

/// Grace window when a record predates the field.
pub const DEFAULT_GRACE_PERIOD_DAYS: u32 = 7;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

fn default_cache_valid_days() -> u32 {
    DEFAULT_CACHE_VALID_DAYS
}

fn default_grace_period_days() -> u32 {
    DEFAULT_GRACE_PERIOD_DAYS
}

/// `at + days`, saturating at the latest representable instant.
fn add_days(at: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    at.checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Seat usage as reported by the authority. Trusted as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seats {
    pub used: u32,
    pub max: u32,
}

/// Last known license state for this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// The license key.
    pub key: LicenseKey,
    /// When the license was activated on this machine.
    pub activated_at: DateTime<Utc>,
    /// When the subscription ends at the authority.
    pub expires_at: DateTime<Utc>,
    /// Granted feature IDs; entries ending in `.*` are prefix grants.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub seats: Seats,
    /// Days the cache stays usable after the last confirmation.
    #[serde(default = "default_cache_valid_days")]
    pub cache_valid_days: u32,
    /// Days of grace after the cache goes stale.
    #[serde(default = "default_grace_period_days")]
    pub grace_period_days: u32,
    /// Last successful remote confirmation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
}

impl LicenseRecord {
    /// Start of the current offline window. Revalidation resets the clock.
    #[must_use]
    pub fn validity_anchor(&self) -> DateTime<Utc> {
        self.last_validated.unwrap_or(self.activated_at)
    }

    /// Instant after which the cache is stale.
    #[must_use]
    pub fn cache_expires_at(&self) -> DateTime<Utc> {
        add_days(self.validity_anchor(), self.cache_valid_days)
    }

    /// Last instant at which a stale cache is still in grace.
    #[must_use]
    pub fn grace_ends_at(&self) -> DateTime<Utc> {
        add_days(self.cache_expires_at(), self.grace_period_days)
    }

    /// True once `now` is past the offline window.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.cache_expires_at()
    }

    /// True when expired but not yet past the grace window.
    #[must_use]
    pub fn is_in_grace_period(&self, now: DateTime<Utc>) -> bool {
        self.is_expired(now) && now <= self.grace_ends_at()
    }

    /// Signed whole days to the relevant boundary, rounded up.
    ///
    /// The boundary is cache expiry while fresh and the end of grace once
    /// expired. Negative means the boundary has passed. For display only;
    /// gating uses [`Self::is_expired`] and [`Self::is_in_grace_period`].
    #[must_use]
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        let boundary = if self.is_expired(now) {
            self.grace_ends_at()
        } else {
            self.cache_expires_at()
        };
        let secs = boundary.signed_duration_since(now).num_seconds();
        secs.div_euclid(SECS_PER_DAY) + i64::from(secs.rem_euclid(SECS_PER_DAY) != 0)
    }

    /// Applies a successful validation in place.
    ///
    /// Feature, seat and expiry fields come from the authority.
    /// `last_validated` never moves backwards, nor before activation.
    pub fn refresh_from(&mut self, fresh: &LicenseRecord, now: DateTime<Utc>) {
        self.expires_at = fresh.expires_at;
        self.features = fresh.features.clone();
        self.seats = fresh.seats;
        self.cache_valid_days = fresh.cache_valid_days;
        self.grace_period_days = fresh.grace_period_days;

        self.mark_validated(fresh.last_validated.map_or(now, |at| at.max(now)));
    }

    /// Records a remote confirmation at `at`, never moving the anchor back.
    pub fn mark_validated(&mut self, at: DateTime<Utc>) {
        self.last_validated = Some(self.validity_anchor().max(at));
    }
}
