//! Feature availability decisions.
//!
//! The license state is never stored. Every decision recomputes it from the
//! cached record and the current time, so a long-running process crosses
//! expiry and grace boundaries on its own. The only memoized value is the
//! cache snapshot, which [`FeatureGate::reload`] drops.

use crate::cache::{CacheRead, LicenseCache};
use crate::clock::{Clock, SystemClock};
use crate::error::ProFeatureError;
use crate::grant::GrantSet;
use crate::record::{LicenseRecord, Seats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Command shown to users who need to (re)activate.
pub const DEFAULT_ACTIVATE_COMMAND: &str = "progate activate <LICENSE-KEY>";

/// Effective license state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    /// No usable cache on this machine.
    NotActivated,
    /// Cache is within its offline window.
    Active,
    /// Cache is stale but within the grace window.
    Grace,
    /// Cache is past the grace window.
    Expired,
}

impl LicenseState {
    /// Computes the state for a cache snapshot at `now`.
    #[must_use]
    pub fn of(record: Option<&LicenseRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => Self::NotActivated,
            Some(r) if !r.is_expired(now) => Self::Active,
            Some(r) if r.is_in_grace_period(now) => Self::Grace,
            Some(_) => Self::Expired,
        }
    }

    /// Returns true if pro features may run in this state.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Active | Self::Grace)
    }
}

impl std::fmt::Display for LicenseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NotActivated => "not activated",
            Self::Active => "active",
            Self::Grace => "in grace period",
            Self::Expired => "expired",
        })
    }
}

/// Condition of the local cache when the snapshot was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheHealth {
    Present,
    Missing,
    /// Tampered or damaged; discarded.
    Corrupt,
    /// Copied from another machine; discarded.
    Foreign,
}

/// Read-only license summary for hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateStatus {
    pub state: LicenseState,
    pub cache: CacheHealth,
    /// Masked key, never the raw key.
    pub key: Option<String>,
    pub seats: Option<Seats>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cache_expires_at: Option<DateTime<Utc>>,
    pub grace_ends_at: Option<DateTime<Utc>>,
    pub last_validated: Option<DateTime<Utc>>,
    /// Display only. See [`LicenseRecord::days_remaining`].
    pub days_remaining: Option<i64>,
    /// Set in grace: decisions rely on stale data and the host should revalidate.
    pub revalidation_recommended: bool,
    pub features: Vec<String>,
}

#[derive(Debug)]
struct Snapshot {
    record: Option<LicenseRecord>,
    grants: GrantSet,
    health: CacheHealth,
}

impl Snapshot {
    fn sorted_entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self.grants.iter().map(|g| g.as_entry()).collect();
        entries.sort();
        entries
    }

    fn load(cache: &LicenseCache) -> Self {
        let (record, health) = match cache.read_detailed() {
            CacheRead::Present(record) => (Some(record), CacheHealth::Present),
            CacheRead::Missing => (None, CacheHealth::Missing),
            CacheRead::Corrupt => (None, CacheHealth::Corrupt),
            CacheRead::Foreign => (None, CacheHealth::Foreign),
        };
        let grants = record
            .as_ref()
            .map(|r| GrantSet::parse(&r.features))
            .unwrap_or_default();
        Self {
            record,
            grants,
            health,
        }
    }
}

/// Decides whether pro features are available.
///
/// Owned by the host and shared by reference; there is no global instance.
pub struct FeatureGate {
    cache: LicenseCache,
    clock: Arc<dyn Clock>,
    activate_command: String,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
}

impl std::fmt::Debug for FeatureGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureGate")
            .field("cache", &self.cache.path())
            .field("activate_command", &self.activate_command)
            .finish_non_exhaustive()
    }
}

impl FeatureGate {
    /// Creates a gate over `cache` using the system clock.
    pub fn new(cache: LicenseCache) -> Self {
        Self::with_clock(cache, Arc::new(SystemClock))
    }

    pub fn with_clock(cache: LicenseCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache,
            clock,
            activate_command: DEFAULT_ACTIVATE_COMMAND.to_string(),
            snapshot: RwLock::new(None),
        }
    }

    /// Sets the command named in denial hints.
    #[must_use]
    pub fn with_activate_command(mut self, command: impl Into<String>) -> Self {
        self.activate_command = command.into();
        self
    }

    /// Current effective state.
    pub fn state(&self) -> LicenseState {
        let snapshot = self.snapshot();
        LicenseState::of(snapshot.record.as_ref(), self.clock.now())
    }

    /// True only when the license is usable and grants `feature_id`.
    pub fn is_available(&self, feature_id: &str) -> bool {
        let snapshot = self.snapshot();
        LicenseState::of(snapshot.record.as_ref(), self.clock.now()).is_usable()
            && snapshot.grants.contains(feature_id)
    }

    /// Like [`Self::is_available`], returning a structured denial.
    ///
    /// # Errors
    ///
    /// Returns [`ProFeatureError`] when the feature is unavailable. Callers
    /// should fall back to the free path.
    pub fn require(&self, feature_id: &str, friendly_name: &str) -> Result<(), ProFeatureError> {
        let snapshot = self.snapshot();
        let state = LicenseState::of(snapshot.record.as_ref(), self.clock.now());
        if state.is_usable() && snapshot.grants.contains(feature_id) {
            return Ok(());
        }

        Err(ProFeatureError {
            feature_id: feature_id.to_string(),
            friendly_name: friendly_name.to_string(),
            state,
            hint: self.hint(state),
        })
    }

    /// Runs `pro` when the feature is available and `free` otherwise.
    pub fn gated<T>(
        &self,
        feature_id: &str,
        friendly_name: &str,
        pro: impl FnOnce() -> T,
        free: impl FnOnce() -> T,
    ) -> T {
        match self.require(feature_id, friendly_name) {
            Ok(()) => pro(),
            Err(denial) => {
                debug!("Using free path: {}", denial);
                free()
            }
        }
    }

    /// Granted feature entries (wildcards included), sorted.
    /// Empty unless the license is usable.
    pub fn list_available(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        if !LicenseState::of(snapshot.record.as_ref(), self.clock.now()).is_usable() {
            return Vec::new();
        }
        snapshot.sorted_entries()
    }

    /// Granted feature entries grouped by module.
    /// Empty unless the license is usable.
    pub fn list_by_module(&self) -> BTreeMap<String, Vec<String>> {
        let snapshot = self.snapshot();
        if !LicenseState::of(snapshot.record.as_ref(), self.clock.now()).is_usable() {
            return BTreeMap::new();
        }
        snapshot.grants.by_module()
    }

    /// Summary for display.
    pub fn status(&self) -> GateStatus {
        let snapshot = self.snapshot();
        let now = self.clock.now();
        let state = LicenseState::of(snapshot.record.as_ref(), now);
        let record = snapshot.record.as_ref();

        let features = if state.is_usable() {
            snapshot.sorted_entries()
        } else {
            Vec::new()
        };

        GateStatus {
            state,
            cache: snapshot.health,
            key: record.map(|r| r.key.masked()),
            seats: record.map(|r| r.seats),
            expires_at: record.map(|r| r.expires_at),
            cache_expires_at: record.map(LicenseRecord::cache_expires_at),
            grace_ends_at: record.map(LicenseRecord::grace_ends_at),
            last_validated: record.and_then(|r| r.last_validated),
            days_remaining: record.map(|r| r.days_remaining(now)),
            revalidation_recommended: state == LicenseState::Grace,
            features,
        }
    }

    /// The cached record behind the current snapshot.
    pub fn record(&self) -> Option<LicenseRecord> {
        self.snapshot().record.clone()
    }

    /// Drops the memoized snapshot; the next decision rereads storage.
    ///
    /// Must be called after every write to the cache.
    pub fn reload(&self) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
        debug!("Feature gate snapshot invalidated");
    }

    /// The clock decisions are made against.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        {
            let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
            if let Some(snapshot) = guard.as_ref() {
                return Arc::clone(snapshot);
            }
        }

        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        if let Some(snapshot) = guard.as_ref() {
            return Arc::clone(snapshot);
        }
        let snapshot = Arc::new(Snapshot::load(&self.cache));
        debug!(
            "Loaded license snapshot ({:?}, {} grants)",
            snapshot.health,
            snapshot.grants.len()
        );
        *guard = Some(Arc::clone(&snapshot));
        snapshot
    }

    fn hint(&self, state: LicenseState) -> String {
        let cmd = &self.activate_command;
        match state {
            LicenseState::NotActivated => {
                format!("Activate a license with `{cmd}`. Core features remain available.")
            }
            LicenseState::Expired => format!(
                "The license could not be confirmed online in time. Reconnect and run `{cmd}`. \
                 Core features remain available."
            ),
            LicenseState::Active | LicenseState::Grace => format!(
                "Your license does not include this feature. After upgrading, run `{cmd}`. \
                 Core features remain available."
            ),
        }
    }
}
