//! Known exporters and their online status.
//!
//! The broker only reads from the registry. Discovery feeds push updates
//! through [`InMemoryRegistry::refresh`] and friends; every update replaces
//! whole records so readers never observe a half-written exporter.

use crate::error::{BrokerError, Result};
use crate::types::Resource;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Read-only view of the exporter set consumed by the broker.
pub trait ResourceRegistry: Send + Sync {
    /// Snapshot of all known exporters, ordered by identifier.
    fn list(&self) -> Vec<Resource>;

    fn get(&self, id: &str) -> Result<Resource>;
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    resources: RwLock<BTreeMap<String, Arc<Resource>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Self {
        let registry = Self::new();
        registry.refresh(resources);
        registry
    }

    /// Replaces the whole exporter set with a fresh discovery snapshot.
    pub fn refresh(&self, resources: impl IntoIterator<Item = Resource>) {
        let next: BTreeMap<_, _> = resources
            .into_iter()
            .map(|r| (r.id.clone(), Arc::new(r)))
            .collect();
        let count = next.len();
        *self.resources.write() = next;
        tracing::debug!(exporters = count, "Registry refreshed");
    }

    /// Inserts or replaces a single exporter record.
    pub fn upsert(&self, resource: Resource) {
        self.resources
            .write()
            .insert(resource.id.clone(), Arc::new(resource));
    }

    pub fn remove(&self, id: &str) -> Option<Resource> {
        self.resources
            .write()
            .remove(id)
            .map(Arc::unwrap_or_clone)
    }

    pub fn set_online(&self, id: &str, online: bool) -> Result<()> {
        let mut guard = self.resources.write();
        let current = guard
            .get(id)
            .ok_or_else(|| BrokerError::ResourceNotFound(id.to_string()))?;
        if current.online != online {
            let updated = Resource {
                online,
                ..Resource::clone(current)
            };
            guard.insert(id.to_string(), Arc::new(updated));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

impl ResourceRegistry for InMemoryRegistry {
    fn list(&self) -> Vec<Resource> {
        self.resources
            .read()
            .values()
            .map(|r| Resource::clone(r))
            .collect()
    }

    fn get(&self, id: &str) -> Result<Resource> {
        self.resources
            .read()
            .get(id)
            .map(|r| Resource::clone(r))
            .ok_or_else(|| BrokerError::ResourceNotFound(id.to_string()))
    }
}

/// On-disk exporter inventory, the file-based stand-in for a discovery feed.
///
/// ```json
/// { "exporters": [ { "id": "e1", "labels": { "type": "a" }, "online": true } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub exporters: Vec<Resource>,
}

impl Inventory {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BrokerError::InvalidConfig(format!("cannot read inventory {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let inventory: Self = serde_json::from_str(raw)
            .map_err(|e| BrokerError::InvalidConfig(format!("cannot parse inventory: {}", e)))?;
        let mut seen = std::collections::HashSet::new();
        for exporter in &inventory.exporters {
            if exporter.id.is_empty() {
                return Err(BrokerError::InvalidConfig(
                    "inventory exporter with empty id".to_string(),
                ));
            }
            if !seen.insert(exporter.id.as_str()) {
                return Err(BrokerError::InvalidConfig(format!(
                    "duplicate exporter id '{}' in inventory",
                    exporter.id
                )));
            }
        }
        Ok(inventory)
    }

    pub fn into_registry(self) -> InMemoryRegistry {
        InMemoryRegistry::from_resources(self.exporters)
    }
}
