//! High-level facade over the registry, selector matcher and ledger.
//! The CLI front end and any embedding service delegate to this.

use crate::clock::{Clock, SystemClock};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::infrastructure::LeaseStore;
use crate::ledger::LeaseLedger;
use crate::registry::ResourceRegistry;
use crate::selector::Selector;
use crate::sweeper::ExpirySweeper;
use crate::types::{Labels, Lease, Resource};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Filters for [`LeaseBroker::exporters`].
#[derive(Debug, Clone)]
pub struct ExporterQuery {
    pub selector: Option<String>,
    /// Attach the lease currently holding each exporter
    pub include_leases: bool,
    /// Report each exporter's online flag
    pub include_online: bool,
}

impl Default for ExporterQuery {
    fn default() -> Self {
        Self {
            selector: None,
            include_leases: false,
            include_online: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExporterInfo {
    pub id: String,
    pub labels: Labels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,
}

/// Answer to a configuration query.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerInfo {
    pub config: BrokerConfig,
    pub storage: String,
    pub exporters: usize,
    pub live_leases: usize,
}

/// The main entry point: matches exporters against selectors and hands out
/// exclusive, time-bounded leases on them.
pub struct LeaseBroker {
    config: BrokerConfig,
    registry: Arc<dyn ResourceRegistry>,
    ledger: Arc<LeaseLedger>,
    clock: Arc<dyn Clock>,
}

impl LeaseBroker {
    /// Assemble a broker from already-built parts.
    pub fn new(
        config: BrokerConfig,
        registry: Arc<dyn ResourceRegistry>,
        ledger: Arc<LeaseLedger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            ledger,
            clock,
        })
    }

    /// A broker with a process-local ledger and the system clock.
    pub fn in_memory(config: BrokerConfig, registry: Arc<dyn ResourceRegistry>) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(LeaseLedger::new(config.bounds()));
        Self::new(config, registry, ledger, Arc::new(SystemClock))
    }

    /// A broker whose ledger is loaded from, and written through to, `store`.
    pub fn with_store(
        config: BrokerConfig,
        registry: Arc<dyn ResourceRegistry>,
        store: Box<dyn LeaseStore>,
    ) -> Result<Self> {
        config.validate()?;
        let ledger = Arc::new(LeaseLedger::with_store(config.bounds(), store)?);
        Self::new(config, registry, ledger, Arc::new(SystemClock))
    }

    /// Create a broker backed by SQLite at the given path.
    /// Leases persist across restarts.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(
        config: BrokerConfig,
        registry: Arc<dyn ResourceRegistry>,
        path: &str,
    ) -> Result<Self> {
        let store = crate::infrastructure_sqlite::SqliteLeaseStore::open(path)?;
        Self::with_store(config, registry, Box::new(store))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ledger(&self) -> &Arc<LeaseLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<dyn ResourceRegistry> {
        &self.registry
    }

    /// Lease one online exporter matching `selector` for `duration`.
    ///
    /// Candidates are tried in ascending identifier order; an exporter that
    /// turns out to be held is skipped in favour of the next one.
    pub fn allocate(&self, selector: &str, duration: Duration, name: Option<&str>) -> Result<Lease> {
        let selector = Selector::parse(selector)?;
        self.ledger.bounds().check(duration)?;

        let mut candidates: Vec<Resource> = self
            .registry
            .list()
            .into_iter()
            .filter(|r| r.online && selector.matches(&r.labels))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        if candidates.is_empty() {
            return Err(BrokerError::NoAvailableResource(selector.to_string()));
        }

        let now = self.clock.now_ms();
        for candidate in &candidates {
            match self.ledger.claim(&candidate.id, duration, name, &selector, now) {
                Ok(lease) => return Ok(lease),
                Err(BrokerError::ResourceBusy { lease_id, .. }) => {
                    tracing::debug!(
                        resource_id = %candidate.id,
                        held_by = %lease_id,
                        "Candidate busy, trying next"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            selector = %selector,
            candidates = candidates.len(),
            "All matching exporters are leased"
        );
        Err(BrokerError::AllResourcesBusy(selector.to_string()))
    }

    /// Leases on exporters matching `selector` (all leases when `None` or
    /// empty), oldest first, with expiry applied as of now.
    pub fn list(&self, selector: Option<&str>) -> Result<Vec<Lease>> {
        let selector = match selector {
            Some(s) => Selector::parse(s)?,
            None => Selector::any(),
        };
        let now = self.clock.now_ms();
        Ok(self
            .ledger
            .list(&selector, self.registry.as_ref())
            .into_iter()
            .map(|l| l.observed_at(now))
            .collect())
    }

    /// Release a held lease by its ID.
    pub fn release(&self, lease_id: &str) -> Result<Lease> {
        self.ledger.release(lease_id, self.clock.now_ms())
    }

    /// Look up a single lease, with expiry applied as of now.
    pub fn lease(&self, lease_id: &str) -> Result<Lease> {
        let now = self.clock.now_ms();
        Ok(self.ledger.get(lease_id)?.observed_at(now))
    }

    /// Exporters matching the query, ordered by identifier.
    pub fn exporters(&self, query: &ExporterQuery) -> Result<Vec<ExporterInfo>> {
        let selector = match query.selector.as_deref() {
            Some(s) => Selector::parse(s)?,
            None => Selector::any(),
        };
        let now = self.clock.now_ms();

        let mut exporters: Vec<ExporterInfo> = self
            .registry
            .list()
            .into_iter()
            .filter(|r| selector.matches(&r.labels))
            .map(|r| ExporterInfo {
                lease: if query.include_leases {
                    self.ledger.holder(&r.id, now)
                } else {
                    None
                },
                online: query.include_online.then_some(r.online),
                labels: r.labels,
                id: r.id,
            })
            .collect();
        exporters.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(exporters)
    }

    /// Effective configuration plus a summary of broker state.
    pub fn config(&self) -> BrokerInfo {
        let now = self.clock.now_ms();
        BrokerInfo {
            config: self.config.clone(),
            storage: self.ledger.store_description(),
            exporters: self.registry.list().len(),
            live_leases: self
                .ledger
                .snapshot()
                .iter()
                .filter(|l| l.is_live(now))
                .count(),
        }
    }

    /// A sweeper sharing this broker's ledger and clock.
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.clock),
            self.config.sweep_interval(),
        )
    }
}
