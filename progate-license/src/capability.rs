//! Optional pro capabilities.
//!
//! Hosts register whatever pro capabilities are installed, then resolve them
//! through the gate. A capability that is missing or unlicensed resolves to
//! `None`, and the host takes its free path.

use crate::gate::FeatureGate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A narrow interface to one piece of installed pro functionality.
pub trait ProCapability: Send + Sync {
    /// Feature ID checked against license grants.
    fn feature_id(&self) -> &str;

    /// Human-facing name used in denial messages.
    fn name(&self) -> &str;
}

/// Installed pro capabilities, keyed by feature ID.
#[derive(Default)]
pub struct CapabilitySet {
    installed: BTreeMap<String, Arc<dyn ProCapability>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability, replacing any with the same feature ID.
    pub fn install(&mut self, capability: Arc<dyn ProCapability>) {
        self.installed
            .insert(capability.feature_id().to_string(), capability);
    }

    pub fn is_installed(&self, feature_id: &str) -> bool {
        self.installed.contains_key(feature_id)
    }

    /// Returns the capability only if it is installed and licensed.
    pub fn resolve(&self, gate: &FeatureGate, feature_id: &str) -> Option<Arc<dyn ProCapability>> {
        let Some(capability) = self.installed.get(feature_id) else {
            debug!("Pro capability {} is not installed", feature_id);
            return None;
        };
        match gate.require(feature_id, capability.name()) {
            Ok(()) => Some(Arc::clone(capability)),
            Err(denial) => {
                debug!("{}", denial);
                None
            }
        }
    }

    /// Feature IDs that are both installed and licensed.
    pub fn usable(&self, gate: &FeatureGate) -> Vec<String> {
        self.installed
            .keys()
            .filter(|id| gate.is_available(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet")
            .field("installed", &self.installed.keys().collect::<Vec<_>>())
            .finish()
    }
}
