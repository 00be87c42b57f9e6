//! # benchlease-core
//!
//! Lease broker for shared lab hardware. Matches exporters against
//! equality label selectors, grants time-bounded exclusive leases on them,
//! and expires leases both lazily on read and eagerly from a background
//! sweeper.

pub mod broker;
pub mod clock;
pub mod config;
pub mod error;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod ledger;
pub mod registry;
pub mod selector;
pub mod sweeper;
pub mod types;

pub use broker::{BrokerInfo, ExporterInfo, ExporterQuery, LeaseBroker};
pub use error::{BrokerError, ErrorKind, Result};

#[cfg(test)]
mod ledger_test;
#[cfg(test)]
mod sweeper_test;
