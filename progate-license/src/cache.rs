//! Durable, sealed record of the last known license state.
//!
//! The cache is a time-bounded projection of the authority's state. Read
//! failures never propagate: a tampered or foreign file is moved aside and
//! the machine is treated as not activated.

use crate::error::LicenseResult;
use crate::record::LicenseRecord;
use crate::store::{SealedSlot, SlotRead};
use progate_crypto::SealedBox;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File name of the license cache inside the data directory.
pub const CACHE_FILE: &str = "license.cache";

/// Why the cache did or did not yield a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRead {
    Present(LicenseRecord),
    /// No cache file exists.
    Missing,
    /// The file was tampered with or damaged and has been quarantined.
    Corrupt,
    /// The file was copied from another machine and has been quarantined.
    Foreign,
}

impl CacheRead {
    /// Returns the record, if any.
    pub fn into_record(self) -> Option<LicenseRecord> {
        match self {
            Self::Present(record) => Some(record),
            _ => None,
        }
    }
}

/// The sealed license cache file.
#[derive(Debug, Clone)]
pub struct LicenseCache {
    slot: SealedSlot,
}

impl LicenseCache {
    /// Opens the cache stored in `data_dir`.
    pub fn new(data_dir: &Path, sealer: Arc<SealedBox>) -> Self {
        Self::at(data_dir.join(CACHE_FILE), sealer)
    }

    /// Opens a cache at an explicit file path.
    pub fn at(path: PathBuf, sealer: Arc<SealedBox>) -> Self {
        Self {
            slot: SealedSlot::new(path, sealer),
        }
    }

    /// Path of the cache file.
    pub fn path(&self) -> &Path {
        self.slot.path()
    }

    /// Persists `record`, replacing any existing cache atomically.
    ///
    /// # Errors
    ///
    /// Returns a storage error with the failing path. Callers keep running
    /// in Core mode; nothing already on disk is damaged by a failed write.
    pub fn write(&self, record: &LicenseRecord) -> LicenseResult<()> {
        self.slot.write(record)?;
        debug!("Cached license {}", record.key);
        Ok(())
    }

    /// Returns the cached record, or `None` if there is no usable cache.
    pub fn read(&self) -> Option<LicenseRecord> {
        self.read_detailed().into_record()
    }

    /// Reads the cache and reports why it is absent when it is.
    pub fn read_detailed(&self) -> CacheRead {
        match self.slot.read::<LicenseRecord>() {
            SlotRead::Present(record) => CacheRead::Present(record),
            SlotRead::Missing => CacheRead::Missing,
            SlotRead::Foreign => {
                warn!(
                    "License cache {:?} was created on another machine; reactivation required",
                    self.path()
                );
                self.slot.quarantine();
                CacheRead::Foreign
            }
            SlotRead::Corrupt(reason) => {
                warn!("License cache {:?} is unreadable: {}", self.path(), reason);
                self.slot.quarantine();
                CacheRead::Corrupt
            }
            SlotRead::Unreadable(e) => {
                // Left in place: permission problems are not tampering.
                warn!("Could not read license cache {:?}: {}", self.path(), e);
                CacheRead::Missing
            }
        }
    }

    /// Removes the cache. Idempotent.
    pub fn delete(&self) -> LicenseResult<()> {
        self.slot.delete()
    }
}
