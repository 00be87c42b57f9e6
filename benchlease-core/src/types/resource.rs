use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label set attached to an exporter. Keys are unique; ordering is only
/// used to keep listings and persisted records stable.
pub type Labels = BTreeMap<String, String>;

/// A leasable hardware unit (an "exporter") as reported by discovery.
///
/// The current lease is not stored here; the ledger owns that relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique, immutable exporter identifier
    pub id: String,
    /// Labels the selector matcher evaluates against
    #[serde(default)]
    pub labels: Labels,
    /// Whether the exporter is currently reachable
    #[serde(default = "default_online")]
    pub online: bool,
}

fn default_online() -> bool {
    true
}

impl Resource {
    /// Creates an online resource with no labels.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: Labels::new(),
            online: true,
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }
}
