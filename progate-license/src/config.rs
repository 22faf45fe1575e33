//! Licensing configuration.
//!
//! Read from `<data_dir>/license.toml` when present. A missing file means
//! defaults; a malformed one is logged and ignored. `PROGATE_HOME` and
//! `PROGATE_AUTHORITY_URL` override the file.

use crate::error::{LicenseError, LicenseResult};
use crate::gate::DEFAULT_ACTIVATE_COMMAND;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "license.toml";

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "PROGATE_HOME";

/// Environment variable overriding the authority URL.
pub const AUTHORITY_URL_ENV: &str = "PROGATE_AUTHORITY_URL";

/// Default license authority.
pub const DEFAULT_AUTHORITY_URL: &str = "https://license.progate.dev";

/// Licensing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LicenseConfig {
    /// Directory holding the cache, tracker and fallback machine id.
    pub data_dir: PathBuf,
    /// Base URL of the license authority.
    pub authority_url: String,
    /// Timeout for activate/validate/deactivate.
    pub request_timeout_secs: u64,
    /// Timeout for the reachability probe.
    pub probe_timeout_secs: u64,
    /// Host version reported on activation.
    pub host_version: String,
    /// Command named in denial hints.
    pub activate_command: String,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            request_timeout_secs: 10,
            probe_timeout_secs: 3,
            host_version: env!("CARGO_PKG_VERSION").to_string(),
            activate_command: DEFAULT_ACTIVATE_COMMAND.to_string(),
        }
    }
}

impl LicenseConfig {
    /// Loads config from the default data directory, then applies the
    /// environment overrides.
    pub fn load() -> Self {
        Self::load_from(&default_data_dir().join(CONFIG_FILE)).with_env_overrides()
    }

    /// Loads config from an explicit path. Falls back to defaults with a
    /// warning when the file is unreadable or malformed.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No license config at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded license config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("{}. Falling back to default license config.", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read license config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Parses a TOML document.
    pub fn from_toml_str(contents: &str) -> LicenseResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| LicenseError::Config(format!("invalid license config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PROGATE_HOME` and `PROGATE_AUTHORITY_URL`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            self.data_dir = PathBuf::from(home);
        }
        if let Ok(url) = std::env::var(AUTHORITY_URL_ENV) {
            if !url.trim().is_empty() {
                self.authority_url = url.trim().to_string();
            }
        }
        self
    }

    /// Config rooted at `data_dir`, otherwise default. Convenient for tests
    /// and embedding hosts.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    fn validate(&self) -> LicenseResult<()> {
        if self.request_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(LicenseError::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if !(self.authority_url.starts_with("https://") || self.authority_url.starts_with("http://"))
        {
            return Err(LicenseError::Config(format!(
                "authority-url must be an http(s) URL, got {:?}",
                self.authority_url
            )));
        }
        Ok(())
    }
}

/// `$PROGATE_HOME`, else `~/.progate`, else `./.progate`.
pub fn default_data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".progate")
}
