use crate::error::StoreError;
use crate::infrastructure::LeaseStore;
use crate::types::Lease;
use std::collections::HashMap;

/// Process-local lease records. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    // Insertion-ordered records
    records: Vec<Lease>,
    // Map of Lease ID -> position in `records`
    index: HashMap<String, usize>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with previously persisted records.
    pub fn with_records(records: impl IntoIterator<Item = Lease>) -> Self {
        let mut store = Self::new();
        for lease in records {
            store.upsert(lease);
        }
        store
    }

    fn upsert(&mut self, lease: Lease) {
        match self.index.get(&lease.id) {
            Some(&pos) => self.records[pos] = lease,
            None => {
                self.index.insert(lease.id.clone(), self.records.len());
                self.records.push(lease);
            }
        }
    }
}

impl LeaseStore for InMemoryLeaseStore {
    fn load_all(&mut self) -> Result<Vec<Lease>, StoreError> {
        Ok(self.records.clone())
    }

    fn save(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.upsert(lease.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
