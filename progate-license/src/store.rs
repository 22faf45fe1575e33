//! Sealed single-value file slots.
//!
//! Both the license cache and the pending-deactivation tracker persist one
//! JSON value per file through a [`SealedSlot`]. Writes are verified by
//! reopening the sealed bytes before anything touches disk, then land via
//! temp file and rename so a crash never leaves a half-written slot.

use crate::error::{LicenseError, LicenseResult};
use progate_crypto::{CryptoError, SealedBox};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Suffix given to slots that failed to open.
pub const QUARANTINE_SUFFIX: &str = "corrupt";

/// Outcome of reading a slot.
#[derive(Debug)]
pub enum SlotRead<T> {
    /// The slot held a valid value.
    Present(T),
    /// No file exists.
    Missing,
    /// The file failed its integrity check or did not parse.
    Corrupt(String),
    /// The file was sealed on another machine.
    Foreign,
    /// The file exists but could not be read.
    Unreadable(io::Error),
}

/// One sealed file holding a single JSON value.
#[derive(Debug, Clone)]
pub struct SealedSlot {
    path: PathBuf,
    sealer: Arc<SealedBox>,
}

impl SealedSlot {
    /// Creates a slot at `path`. Nothing is touched on disk.
    pub fn new(path: PathBuf, sealer: Arc<SealedBox>) -> Self {
        Self { path, sealer }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seals `value`, proves it reopens, then replaces the file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Storage`] naming the path on I/O failure, or
    /// a crypto/serialization error if the sealed bytes would be unreadable.
    pub fn write<T>(&self, value: &T) -> LicenseResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let sealed = self.sealer.seal_json(value)?;
        let _: T = self.sealer.open_json(&sealed)?;

        atomic_write(&self.path, &sealed).map_err(|e| {
            LicenseError::Storage(format!(
                "could not write {}: {e}. Check that the directory exists and is writable.",
                self.path.display()
            ))
        })?;
        debug!("Wrote sealed slot {:?} ({} bytes)", self.path, sealed.len());
        Ok(())
    }

    /// Reads and opens the slot without side effects.
    pub fn read<T: DeserializeOwned>(&self) -> SlotRead<T> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return SlotRead::Missing,
            Err(e) => return SlotRead::Unreadable(e),
        };

        match self.sealer.open_json(&bytes) {
            Ok(value) => SlotRead::Present(value),
            Err(CryptoError::KeyMismatch) => SlotRead::Foreign,
            Err(e) => SlotRead::Corrupt(e.to_string()),
        }
    }

    /// Moves an unreadable file aside, deleting it if the move fails.
    ///
    /// Best effort: failures are logged, never returned.
    pub fn quarantine(&self) {
        let target = quarantine_path(&self.path);
        match fs::rename(&self.path, &target) {
            Ok(()) => warn!("Quarantined unreadable slot {:?} to {:?}", self.path, target),
            Err(rename_err) => match fs::remove_file(&self.path) {
                Ok(()) => warn!(
                    "Deleted unreadable slot {:?} (quarantine failed: {})",
                    self.path, rename_err
                ),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove unreadable slot {:?}: {}", self.path, e),
            },
        }
    }

    /// Removes the file. Succeeds if it is already gone.
    pub fn delete(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Deleted slot {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseError::Storage(format!(
                "could not delete {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Path a quarantined slot is moved to.
pub fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(QUARANTINE_SUFFIX);
    path.with_file_name(name)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    tmp.as_file_mut().write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
