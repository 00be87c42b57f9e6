//! The lease ledger: every lease record and which exporter each live lease
//! holds.
//!
//! All mutations (claim, release, expire) run inside one mutex, so the
//! "at most one live lease per exporter" check and the insert that follows
//! it can never interleave with another claim. Each mutation is written
//! through to the [`LeaseStore`] before the lock is released; a store
//! failure rolls the in-memory change back.

use crate::config::DurationBounds;
use crate::error::{BrokerError, Result, StoreError};
use crate::infrastructure::LeaseStore;
use crate::infrastructure_in_memory::InMemoryLeaseStore;
use crate::registry::ResourceRegistry;
use crate::selector::Selector;
use crate::types::{Lease, LeaseState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

const LEASE_ID_LEN: usize = 16;

struct LedgerState {
    // Insertion-ordered, never shrinks
    leases: Vec<Lease>,
    // Map of Lease ID -> position in `leases`
    index: HashMap<String, usize>,
    // Map of Resource ID -> ID of the live lease holding it
    holders: HashMap<String, String>,
    store: Box<dyn LeaseStore>,
}

impl LedgerState {
    /// Moves the lease at `pos` to `to`, persisting the change first.
    fn transition(&mut self, pos: usize, to: LeaseState) -> Result<()> {
        let previous = self.leases[pos].state;
        self.leases[pos].state = to;
        if let Err(e) = self.store.save(&self.leases[pos]) {
            self.leases[pos].state = previous;
            return Err(e.into());
        }

        if to.is_terminal() {
            let lease = &self.leases[pos];
            if self.holders.get(&lease.resource_id) == Some(&lease.id) {
                self.holders.remove(&lease.resource_id);
            }
        }
        Ok(())
    }

    fn next_id(&self) -> String {
        loop {
            let id = format!("lease_{}", nanoid::nanoid!(LEASE_ID_LEN));
            if !self.index.contains_key(&id) {
                return id;
            }
        }
    }
}

pub struct LeaseLedger {
    bounds: DurationBounds,
    state: Mutex<LedgerState>,
}

impl LeaseLedger {
    /// Create a ledger with process-local storage.
    pub fn new(bounds: DurationBounds) -> Self {
        Self {
            bounds,
            state: Mutex::new(LedgerState {
                leases: Vec::new(),
                index: HashMap::new(),
                holders: HashMap::new(),
                store: Box::new(InMemoryLeaseStore::new()),
            }),
        }
    }

    /// Create a ledger backed by `store`, loading every record it holds.
    pub fn with_store(bounds: DurationBounds, mut store: Box<dyn LeaseStore>) -> Result<Self> {
        let leases = store.load_all()?;

        let mut index = HashMap::with_capacity(leases.len());
        let mut holders = HashMap::new();
        for (pos, lease) in leases.iter().enumerate() {
            if index.insert(lease.id.clone(), pos).is_some() {
                return Err(StoreError::Corrupt {
                    id: lease.id.clone(),
                    reason: "duplicate lease id".to_string(),
                }
                .into());
            }
            if lease.state.is_terminal() {
                continue;
            }
            if let Some(other) = holders.insert(lease.resource_id.clone(), lease.id.clone()) {
                return Err(StoreError::Corrupt {
                    id: lease.id.clone(),
                    reason: format!(
                        "exporter '{}' also held by live lease '{}'",
                        lease.resource_id, other
                    ),
                }
                .into());
            }
        }

        tracing::debug!(
            leases = leases.len(),
            live = holders.len(),
            store = %store.describe(),
            "Ledger loaded"
        );

        Ok(Self {
            bounds,
            state: Mutex::new(LedgerState {
                leases,
                index,
                holders,
                store,
            }),
        })
    }

    pub fn bounds(&self) -> DurationBounds {
        self.bounds
    }

    pub fn store_description(&self) -> String {
        self.state.lock().store.describe()
    }

    /// Grant a lease on `resource_id`.
    ///
    /// Fails with `DurationOutOfRange` before taking the lock, and with
    /// `ResourceBusy` if a live lease already holds the exporter. A holder
    /// whose deadline has passed is expired on the spot rather than
    /// blocking the claim.
    pub fn claim(
        &self,
        resource_id: &str,
        duration: Duration,
        name: Option<&str>,
        selector: &Selector,
        now: u64,
    ) -> Result<Lease> {
        self.bounds.check(duration)?;

        let mut state = self.state.lock();

        if let Some(holder_id) = state.holders.get(resource_id).cloned() {
            let pos = state.index[&holder_id];
            if !state.leases[pos].is_due(now) {
                return Err(BrokerError::ResourceBusy {
                    resource_id: resource_id.to_string(),
                    lease_id: holder_id,
                });
            }
            state.transition(pos, LeaseState::Expired)?;
            tracing::debug!(lease_id = %holder_id, resource_id, "Expired stale holder on claim");
        }

        let mut lease = Lease::new(
            state.next_id(),
            resource_id.to_string(),
            selector.as_str().to_string(),
            name.map(str::to_string),
            duration,
            now,
        );
        // Binding is immediate; Pending is never persisted or observed
        lease.state = LeaseState::Active;
        state.store.save(&lease)?;

        let pos = state.leases.len();
        state.index.insert(lease.id.clone(), pos);
        state
            .holders
            .insert(resource_id.to_string(), lease.id.clone());
        state.leases.push(lease.clone());

        tracing::info!(
            lease_id = %lease.id,
            resource_id,
            expires_at = lease.expires_at,
            "Lease granted"
        );
        Ok(lease)
    }

    /// Release an Active lease, freeing its exporter.
    ///
    /// A lease that is Active on record but past its deadline is recorded
    /// as Expired and reported as `AlreadyTerminal`.
    pub fn release(&self, lease_id: &str, now: u64) -> Result<Lease> {
        let mut state = self.state.lock();
        let pos = *state
            .index
            .get(lease_id)
            .ok_or_else(|| BrokerError::LeaseNotFound(lease_id.to_string()))?;

        let lease = &state.leases[pos];
        if lease.state.is_terminal() {
            return Err(BrokerError::AlreadyTerminal {
                id: lease_id.to_string(),
                state: lease.state,
            });
        }
        if lease.is_due(now) {
            state.transition(pos, LeaseState::Expired)?;
            return Err(BrokerError::AlreadyTerminal {
                id: lease_id.to_string(),
                state: LeaseState::Expired,
            });
        }

        state.transition(pos, LeaseState::Released)?;
        tracing::info!(lease_id, resource_id = %state.leases[pos].resource_id, "Lease released");
        Ok(state.leases[pos].clone())
    }

    /// Record an Active lease as Expired. Returns whether anything changed;
    /// calling it on a lease that is already terminal is a no-op.
    pub(crate) fn expire(&self, lease_id: &str) -> Result<bool> {
        let mut state = self.state.lock();
        let pos = *state
            .index
            .get(lease_id)
            .ok_or_else(|| BrokerError::LeaseNotFound(lease_id.to_string()))?;

        if state.leases[pos].state.is_terminal() {
            return Ok(false);
        }
        state.transition(pos, LeaseState::Expired)?;
        Ok(true)
    }

    /// IDs of Active leases whose deadline has been reached at `now`.
    pub fn due(&self, now: u64) -> Vec<String> {
        self.state
            .lock()
            .leases
            .iter()
            .filter(|l| l.is_due(now))
            .map(|l| l.id.clone())
            .collect()
    }

    /// Leases whose exporter currently matches `filter`, oldest first.
    ///
    /// States are returned as recorded; callers wanting a live view apply
    /// [`Lease::observed_at`]. Leases on exporters the registry no longer
    /// knows only appear under the empty selector.
    pub fn list(&self, filter: &Selector, registry: &dyn ResourceRegistry) -> Vec<Lease> {
        let leases = self.snapshot();
        if filter.is_empty() {
            return leases;
        }

        let matching: HashMap<String, bool> = registry
            .list()
            .into_iter()
            .map(|r| {
                let ok = filter.matches(&r.labels);
                (r.id, ok)
            })
            .collect();

        leases
            .into_iter()
            .filter(|l| matching.get(&l.resource_id).copied().unwrap_or(false))
            .collect()
    }

    pub fn get(&self, lease_id: &str) -> Result<Lease> {
        let state = self.state.lock();
        state
            .index
            .get(lease_id)
            .map(|&pos| state.leases[pos].clone())
            .ok_or_else(|| BrokerError::LeaseNotFound(lease_id.to_string()))
    }

    /// The lease holding `resource_id` at `now`, if any.
    pub fn holder(&self, resource_id: &str, now: u64) -> Option<Lease> {
        let state = self.state.lock();
        let holder_id = state.holders.get(resource_id)?;
        let lease = &state.leases[state.index[holder_id]];
        lease.is_live(now).then(|| lease.clone())
    }

    /// Every recorded lease, oldest first.
    pub fn snapshot(&self) -> Vec<Lease> {
        self.state.lock().leases.clone()
    }
}
