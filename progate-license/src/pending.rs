//! Offline deactivation intents awaiting sync with the authority.
//!
//! Stored in its own sealed slot so that deleting the license cache never
//! loses a pending deactivation.

use crate::error::LicenseResult;
use crate::key::LicenseKey;
use crate::store::{SealedSlot, SlotRead};
use chrono::{DateTime, Utc};
use progate_crypto::SealedBox;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// File name of the tracker inside the data directory.
pub const PENDING_FILE: &str = "pending-deactivation";

/// A deactivation the authority has not yet heard about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeactivation {
    pub key: LicenseKey,
    pub since: DateTime<Utc>,
}

/// Answer to [`PendingDeactivationTracker::has_pending`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PendingStatus {
    pub pending: bool,
    pub key: Option<LicenseKey>,
    pub since: Option<DateTime<Utc>>,
}

/// Holds at most one pending deactivation.
#[derive(Debug, Clone)]
pub struct PendingDeactivationTracker {
    slot: SealedSlot,
}

impl PendingDeactivationTracker {
    /// Opens the tracker stored in `data_dir`.
    pub fn new(data_dir: &Path, sealer: Arc<SealedBox>) -> Self {
        Self::at(data_dir.join(PENDING_FILE), sealer)
    }

    /// Opens a tracker at an explicit file path.
    pub fn at(path: PathBuf, sealer: Arc<SealedBox>) -> Self {
        Self {
            slot: SealedSlot::new(path, sealer),
        }
    }

    /// Records `key` as deactivated locally but not yet at the authority.
    /// Replaces any earlier pending key.
    pub fn set_pending(&self, key: &LicenseKey, now: DateTime<Utc>) -> LicenseResult<()> {
        let entry = PendingDeactivation {
            key: key.clone(),
            since: now,
        };
        self.slot.write(&entry)?;
        info!("Deactivation of {} queued for sync", key);
        Ok(())
    }

    /// Returns the pending entry, if any.
    pub fn pending(&self) -> Option<PendingDeactivation> {
        match self.slot.read::<PendingDeactivation>() {
            SlotRead::Present(entry) => Some(entry),
            SlotRead::Missing => None,
            SlotRead::Foreign | SlotRead::Corrupt(_) => {
                warn!(
                    "Pending deactivation record {:?} is unreadable; discarding",
                    self.slot.path()
                );
                self.slot.quarantine();
                None
            }
            SlotRead::Unreadable(e) => {
                warn!(
                    "Could not read pending deactivation {:?}: {}",
                    self.slot.path(),
                    e
                );
                None
            }
        }
    }

    pub fn has_pending(&self) -> PendingStatus {
        match self.pending() {
            Some(entry) => PendingStatus {
                pending: true,
                key: Some(entry.key),
                since: Some(entry.since),
            },
            None => PendingStatus::default(),
        }
    }

    /// Forgets the pending deactivation. Idempotent.
    pub fn clear_pending(&self) -> LicenseResult<()> {
        self.slot.delete()
    }
}
