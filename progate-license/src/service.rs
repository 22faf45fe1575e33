//! Host-facing license operations.
//!
//! [`LicenseService`] owns the machine identity, the sealed stores and the
//! authority client, and hands out the shared [`FeatureGate`]. Network calls
//! happen only here, only when the host asks for them.

use crate::cache::LicenseCache;
use crate::client::LicenseAuthority;
use crate::clock::{Clock, SystemClock};
use crate::config::LicenseConfig;
use crate::device::MachineIdentity;
use crate::error::{ActivationErrorCode, LicenseError, LicenseResult};
use crate::gate::{FeatureGate, GateStatus};
use crate::key::LicenseKey;
use crate::pending::{PendingDeactivationTracker, PendingStatus};
use crate::record::LicenseRecord;
use progate_crypto::SealedBox;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`LicenseService::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidateOutcome {
    /// Confirmed; the cache was refreshed.
    Valid(LicenseRecord),
    /// Rejected by the authority; the cache was removed.
    Invalid { reason: Option<String> },
    /// Authority unreachable; the cache was left as is.
    Offline(String),
    /// Nothing to validate.
    NotActivated,
}

/// Result of [`LicenseService::deactivate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeactivateOutcome {
    /// The authority released the seat.
    Online,
    /// Released locally; the authority will be told on the next successful call.
    Offline,
}

/// Pending deactivation as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingReport {
    pub pending: bool,
    /// Masked key.
    pub key: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<PendingStatus> for PendingReport {
    fn from(status: PendingStatus) -> Self {
        Self {
            pending: status.pending,
            key: status.key.map(|k| k.masked()),
            since: status.since,
        }
    }
}

/// Everything `status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStatusReport {
    #[serde(flatten)]
    pub gate: GateStatus,
    pub pending_deactivation: PendingReport,
}

/// Entry point for hosts.
pub struct LicenseService {
    config: LicenseConfig,
    identity: MachineIdentity,
    cache: LicenseCache,
    tracker: PendingDeactivationTracker,
    gate: Arc<FeatureGate>,
    authority: Arc<dyn LicenseAuthority>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LicenseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseService")
            .field("data_dir", &self.config.data_dir)
            .field("authority_url", &self.config.authority_url)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl LicenseService {
    /// Builds a service from config, resolving this machine's identity and
    /// talking to the configured HTTP authority.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be derived or the HTTP client cannot be built.
    #[cfg(feature = "online")]
    pub fn from_config(config: LicenseConfig) -> LicenseResult<Self> {
        let identity = MachineIdentity::resolve(&config.data_dir);
        let authority = Arc::new(crate::client::HttpAuthority::new(&config)?);
        Self::new(config, identity, authority, Arc::new(SystemClock))
    }

    /// Builds a service from explicit parts.
    ///
    /// # Errors
    ///
    /// Fails if the storage key cannot be derived from `identity`.
    pub fn new(
        config: LicenseConfig,
        identity: MachineIdentity,
        authority: Arc<dyn LicenseAuthority>,
        clock: Arc<dyn Clock>,
    ) -> LicenseResult<Self> {
        let sealer = Arc::new(SealedBox::for_identity(identity.as_str())?);
        let cache = LicenseCache::new(&config.data_dir, Arc::clone(&sealer));
        let tracker = PendingDeactivationTracker::new(&config.data_dir, sealer);
        let gate = Arc::new(
            FeatureGate::with_clock(cache.clone(), Arc::clone(&clock))
                .with_activate_command(config.activate_command.clone()),
        );

        debug!("License service ready in {:?}", config.data_dir);
        Ok(Self {
            config,
            identity,
            cache,
            tracker,
            gate,
            authority,
            clock,
        })
    }

    /// Shared gate for feature checks.
    pub fn gate(&self) -> Arc<FeatureGate> {
        Arc::clone(&self.gate)
    }

    pub fn identity(&self) -> &MachineIdentity {
        &self.identity
    }

    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    /// Activates `input` on this machine.
    ///
    /// # Errors
    ///
    /// [`LicenseError::InvalidKeyFormat`] before any network call for a
    /// malformed key; otherwise the authority's error, unchanged. The cache
    /// is untouched on failure.
    pub async fn activate(&self, input: &str) -> LicenseResult<LicenseRecord> {
        let key = LicenseKey::parse(input)?;
        self.sync_pending().await;

        let mut record = self
            .authority
            .activate(&key, &self.identity, &self.config.host_version)
            .await?;
        if record.key != key {
            warn!("Authority answered for a different key; using {}", key);
            record.key = key;
        }
        record.last_validated = None;

        self.cache.write(&record)?;
        self.gate.reload();
        info!("License {} is active on this machine", record.key);
        Ok(record)
    }

    /// Confirms the cached license with the authority.
    ///
    /// # Errors
    ///
    /// Only local storage failures are errors. Authority rejections and
    /// network failures are reported as outcomes.
    pub async fn validate(&self) -> LicenseResult<ValidateOutcome> {
        self.sync_pending().await;

        let Some(mut record) = self.cache.read() else {
            debug!("No license to validate");
            return Ok(ValidateOutcome::NotActivated);
        };

        let response = match self.authority.validate(&record.key, &self.identity).await {
            Ok(response) => response,
            Err(LicenseError::Activation { code, details }) if seat_already_gone(code) => {
                let reason = Some(format!("{code}: {details}"));
                self.invalidate(&record.key, reason.clone())?;
                return Ok(ValidateOutcome::Invalid { reason });
            }
            Err(e) => {
                warn!("Could not validate {}: {}. Keeping cached license.", record.key, e);
                return Ok(ValidateOutcome::Offline(e.to_string()));
            }
        };

        if !response.valid {
            self.invalidate(&record.key, response.reason.clone())?;
            return Ok(ValidateOutcome::Invalid {
                reason: response.reason,
            });
        }

        let now = self.clock.now();
        match response.record {
            Some(fresh) => record.refresh_from(&fresh, now),
            None => record.mark_validated(now),
        }
        self.cache.write(&record)?;
        self.gate.reload();
        info!("License {} revalidated", record.key);
        Ok(ValidateOutcome::Valid(record))
    }

    /// Releases this machine's seat.
    ///
    /// # Errors
    ///
    /// [`LicenseError::NotActivated`] when there is no license to release;
    /// storage errors otherwise. Authority failures fall back to the offline
    /// path.
    pub async fn deactivate(&self) -> LicenseResult<DeactivateOutcome> {
        let Some(record) = self.cache.read() else {
            return Err(LicenseError::NotActivated);
        };
        let key = record.key;

        if self.authority.is_online().await {
            match self.authority.deactivate(&key, &self.identity).await {
                Ok(()) => {
                    self.cache.delete()?;
                    self.gate.reload();
                    info!("License {} deactivated", key);
                    return Ok(DeactivateOutcome::Online);
                }
                Err(e) => warn!("Online deactivation of {} failed: {}", key, e),
            }
        }

        self.tracker.set_pending(&key, self.clock.now())?;
        self.cache.delete()?;
        self.gate.reload();
        info!("License {} deactivated locally; authority sync pending", key);
        Ok(DeactivateOutcome::Offline)
    }

    /// Gate summary plus any pending deactivation.
    pub fn status(&self) -> LicenseStatusReport {
        LicenseStatusReport {
            gate: self.gate.status(),
            pending_deactivation: self.tracker.has_pending().into(),
        }
    }

    /// Granted features grouped by module.
    pub fn list_features(&self) -> BTreeMap<String, Vec<String>> {
        self.gate.list_by_module()
    }

    /// Pending deactivation, if any.
    pub fn pending(&self) -> PendingStatus {
        self.tracker.has_pending()
    }

    fn invalidate(&self, key: &LicenseKey, reason: Option<String>) -> LicenseResult<()> {
        warn!(
            "Authority rejected {}: {}. Removing cached license.",
            key,
            reason.as_deref().unwrap_or("no reason given")
        );
        self.cache.delete()?;
        self.gate.reload();
        Ok(())
    }

    /// Reports a queued deactivation to the authority. Never fails the caller.
    async fn sync_pending(&self) {
        let Some(entry) = self.tracker.pending() else {
            return;
        };

        match self.authority.deactivate(&entry.key, &self.identity).await {
            Ok(()) => {
                info!("Synced pending deactivation of {}", entry.key);
                self.clear_pending();
            }
            Err(LicenseError::Activation { code, .. }) if seat_already_gone(code) => {
                info!(
                    "Authority no longer holds a seat for {} ({}); clearing pending deactivation",
                    entry.key, code
                );
                self.clear_pending();
            }
            Err(e) => debug!("Pending deactivation of {} not synced: {}", entry.key, e),
        }
    }

    fn clear_pending(&self) {
        if let Err(e) = self.tracker.clear_pending() {
            warn!("Failed to clear pending deactivation: {}", e);
        }
    }
}

/// Rejections that mean this machine no longer holds a usable seat.
/// Rate limiting and unrecognized codes say nothing about the license.
fn seat_already_gone(code: ActivationErrorCode) -> bool {
    matches!(
        code,
        ActivationErrorCode::NotFound
            | ActivationErrorCode::MachineMismatch
            | ActivationErrorCode::Revoked
            | ActivationErrorCode::Expired
            | ActivationErrorCode::InvalidKey
    )
}
