//! Feature grants parsed from a license's feature list.
//!
//! `pro.squads.*` grants every feature ID starting with `pro.squads.`
//! (separator included). Any other entry grants exactly itself.

use std::collections::BTreeMap;

/// Suffix marking a prefix grant.
pub const WILDCARD_SUFFIX: &str = ".*";

/// A single parsed grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grant {
    /// Matches one feature ID.
    Exact(String),
    /// Matches every feature ID that starts with this prefix.
    /// The prefix always ends with the `.` separator.
    Prefix(String),
}

impl Grant {
    pub fn parse(entry: &str) -> Self {
        match entry.strip_suffix(WILDCARD_SUFFIX) {
            Some(base) if !base.is_empty() => Self::Prefix(format!("{base}.")),
            _ => Self::Exact(entry.to_string()),
        }
    }

    /// Case-sensitive match against a feature ID.
    pub fn matches(&self, feature_id: &str) -> bool {
        match self {
            Self::Exact(id) => id == feature_id,
            Self::Prefix(prefix) => {
                feature_id.len() > prefix.len() && feature_id.starts_with(prefix.as_str())
            }
        }
    }

    /// The grant in its original list form.
    pub fn as_entry(&self) -> String {
        match self {
            Self::Exact(id) => id.clone(),
            Self::Prefix(prefix) => format!("{prefix}*"),
        }
    }

    /// Module the grant belongs to.
    pub fn module(&self) -> String {
        match self {
            Self::Exact(id) => module_of(id),
            Self::Prefix(prefix) => module_of(prefix),
        }
    }
}

/// Grants parsed once from a feature list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantSet {
    grants: Vec<Grant>,
}

impl GrantSet {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut grants: Vec<Grant> = Vec::with_capacity(entries.len());
        for entry in entries {
            let grant = Grant::parse(entry.as_ref().trim());
            if !grants.contains(&grant) {
                grants.push(grant);
            }
        }
        Self { grants }
    }

    pub fn contains(&self, feature_id: &str) -> bool {
        self.grants.iter().any(|g| g.matches(feature_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Grant entries grouped by module, each group sorted.
    pub fn by_module(&self) -> BTreeMap<String, Vec<String>> {
        let mut modules: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for grant in &self.grants {
            modules.entry(grant.module()).or_default().push(grant.as_entry());
        }
        for entries in modules.values_mut() {
            entries.sort();
        }
        modules
    }
}

/// First path segment of a feature ID.
///
/// `pro.memory.analytics` belongs to `pro`; `tools.export` to `tools`.
pub fn module_of(feature_id: &str) -> String {
    feature_id
        .split('.')
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}
