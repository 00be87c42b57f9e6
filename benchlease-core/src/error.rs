//! Error taxonomy for the lease broker.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by a lease persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt lease record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

/// Errors returned by the registry, ledger and broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("requested duration {requested:?} outside allowed range {min:?}..={max:?}")]
    DurationOutOfRange {
        requested: Duration,
        min: Duration,
        max: Duration,
    },

    #[error("no online exporter matches selector '{0}'")]
    NoAvailableResource(String),

    #[error("all exporters matching selector '{0}' are leased")]
    AllResourcesBusy(String),

    /// Raised by the ledger when the exporter already has a live lease.
    /// The broker consumes it to move on to the next candidate.
    #[error("exporter '{resource_id}' is held by lease '{lease_id}'")]
    ResourceBusy { resource_id: String, lease_id: String },

    #[error("exporter '{0}' not found")]
    ResourceNotFound(String),

    #[error("lease '{0}' not found")]
    LeaseNotFound(String),

    #[error("lease '{id}' is already {state}")]
    AlreadyTerminal {
        id: String,
        state: crate::types::LeaseState,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("lease store: {0}")]
    Store(#[from] StoreError),
}

/// Stable, message-free identifier for each error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidSelector,
    DurationOutOfRange,
    NoAvailableResource,
    AllResourcesBusy,
    ResourceBusy,
    ResourceNotFound,
    LeaseNotFound,
    AlreadyTerminal,
    InvalidConfig,
    Store,
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::InvalidSelector { .. } => ErrorKind::InvalidSelector,
            BrokerError::DurationOutOfRange { .. } => ErrorKind::DurationOutOfRange,
            BrokerError::NoAvailableResource(_) => ErrorKind::NoAvailableResource,
            BrokerError::AllResourcesBusy(_) => ErrorKind::AllResourcesBusy,
            BrokerError::ResourceBusy { .. } => ErrorKind::ResourceBusy,
            BrokerError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            BrokerError::LeaseNotFound(_) => ErrorKind::LeaseNotFound,
            BrokerError::AlreadyTerminal { .. } => ErrorKind::AlreadyTerminal,
            BrokerError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            BrokerError::Store(_) => ErrorKind::Store,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
