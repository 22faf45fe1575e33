//! Machine identity for license binding.
//!
//! Derives a stable identifier for the current host from hardware and OS
//! identifiers. Only a salted digest ever leaves this module, so the raw
//! hostname, machine ID and user name are never transmitted or stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;
use std::path::Path;
use tracing::{debug, warn};

/// Salt mixed into every identity digest.
const IDENTITY_SALT: &str = "progate.machine.v1";

/// File holding the random fallback identity.
pub const FALLBACK_ID_FILE: &str = "machine-id";

/// Information about the current device, sent with activation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// Hostname.
    pub hostname: String,
    /// CPU architecture.
    pub arch: String,
}

impl DeviceInfo {
    /// Collects information about the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            os_name: env::consts::OS.to_string(),
            os_version: get_os_version(),
            hostname: get_hostname().unwrap_or_else(|| "unknown".to_string()),
            arch: env::consts::ARCH.to_string(),
        }
    }
}

/// Opaque, stable identifier for this machine.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineIdentity {
    id: String,
}

impl MachineIdentity {
    /// Resolves the identity of the current host.
    ///
    /// Falls back to a random identifier persisted under `data_dir` when no
    /// stable host attribute is available. Never fails: if even the fallback
    /// cannot be persisted, a process-local random value is used and a
    /// warning is logged.
    #[must_use]
    pub fn resolve(data_dir: &Path) -> Self {
        let components = match collect_hardware_ids() {
            Some(ids) => ids,
            None => vec![fallback_id(data_dir)],
        };
        Self::from_components(&components)
    }

    /// Wraps an identity computed elsewhere (embedding hosts, tests).
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Returns the identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.id
    }

    fn from_components(components: &[String]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(IDENTITY_SALT.as_bytes());
        hasher.update(components.join("|").as_bytes());
        let hash = hasher.finalize();

        Self {
            id: URL_SAFE_NO_PAD.encode(&hash[..16]),
        }
    }
}

impl std::fmt::Debug for MachineIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MachineIdentity").field(&self.id).finish()
    }
}

impl std::fmt::Display for MachineIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Collects hardware identifiers, or `None` if none of them is stable.
fn collect_hardware_ids() -> Option<Vec<String>> {
    let machine_id = get_machine_id();
    let hostname = get_hostname();
    if machine_id.is_none() && hostname.is_none() {
        return None;
    }

    let mut ids = vec![env::consts::OS.to_string(), env::consts::ARCH.to_string()];
    ids.extend(hostname);
    ids.extend(machine_id);

    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        ids.push(user);
    }

    Some(ids)
}

/// Reads the persisted fallback identifier, creating it on first use.
fn fallback_id(data_dir: &Path) -> String {
    let path = data_dir.join(FALLBACK_ID_FILE);
    if let Ok(existing) = std::fs::read_to_string(&path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return existing.to_string();
        }
    }

    let generated = uuid::Uuid::new_v4().to_string();
    let persisted = std::fs::create_dir_all(data_dir)
        .and_then(|()| std::fs::write(&path, &generated));
    match persisted {
        Ok(()) => debug!("Generated fallback machine id at {:?}", path),
        Err(e) => warn!(
            "No stable host identifier and fallback id could not be saved to {:?}: {}",
            path, e
        ),
    }
    generated
}

/// Hostname, ignoring empty values and `localhost`.
fn get_hostname() -> Option<String> {
    let name = hostname::get().ok()?.into_string().ok()?;
    let name = name.trim();
    (!name.is_empty() && name != "localhost").then(|| name.to_string())
}

fn get_os_version() -> String {
    probe::os_version().unwrap_or_else(|| "unknown".to_string())
}

fn get_machine_id() -> Option<String> {
    probe::machine_id().filter(|id| !id.is_empty())
}

#[cfg(target_os = "linux")]
mod probe {
    use std::fs;

    pub fn os_version() -> Option<String> {
        let release = fs::read_to_string("/etc/os-release").ok()?;
        release
            .lines()
            .find_map(|line| line.strip_prefix("VERSION_ID="))
            .map(|v| v.trim_matches('"').to_string())
    }

    pub fn machine_id() -> Option<String> {
        ["/etc/machine-id", "/var/lib/dbus/machine-id"]
            .iter()
            .find_map(|path| fs::read_to_string(path).ok())
            .map(|id| id.trim().to_string())
    }
}

#[cfg(target_os = "macos")]
mod probe {
    use std::process::Command;

    fn run(program: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(program).args(args).output().ok()?;
        String::from_utf8(output.stdout).ok()
    }

    pub fn os_version() -> Option<String> {
        run("sw_vers", &["-productVersion"]).map(|v| v.trim().to_string())
    }

    /// `IOPlatformUUID` from the platform expert device.
    pub fn machine_id() -> Option<String> {
        let output = run("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
        output
            .lines()
            .find(|line| line.contains("IOPlatformUUID"))
            .and_then(|line| line.split('"').nth(3))
            .map(str::to_string)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod probe {
    pub fn os_version() -> Option<String> {
        None
    }

    pub fn machine_id() -> Option<String> {
        None
    }
}
