use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lease states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeaseState {
    /// Created but not yet bound to its exporter
    Pending,
    /// Lease is held and valid
    Active,
    /// Lease was explicitly released
    Released,
    /// Lease deadline passed
    Expired,
}

impl LeaseState {
    /// Released and Expired leases are kept for listing but never rebind.
    pub fn is_terminal(self) -> bool {
        matches!(self, LeaseState::Released | LeaseState::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LeaseState::Pending => "Pending",
            LeaseState::Active => "Active",
            LeaseState::Released => "Released",
            LeaseState::Expired => "Expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(LeaseState::Pending),
            "Active" => Some(LeaseState::Active),
            "Released" => Some(LeaseState::Released),
            "Expired" => Some(LeaseState::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for LeaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time-bound exclusive claim on one exporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Unique lease ID
    pub id: String,
    /// Optional human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Selector the lease was requested with, kept verbatim
    pub selector: String,
    /// Exporter the lease is bound to
    pub resource_id: String,
    /// Current lease state as recorded by the ledger
    pub state: LeaseState,
    /// Creation time in milliseconds since the epoch
    pub created_at: u64,
    /// Requested duration in milliseconds
    pub duration_ms: u64,
    /// When the lease will expire (created_at + duration_ms)
    pub expires_at: u64,
}

impl Lease {
    pub fn new(
        id: String,
        resource_id: String,
        selector: String,
        name: Option<String>,
        duration: Duration,
        now: u64,
    ) -> Self {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self {
            id,
            name,
            selector,
            resource_id,
            state: LeaseState::Pending,
            created_at: now,
            duration_ms,
            expires_at: now.saturating_add(duration_ms),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// True while the lease still holds its exporter at `now`.
    pub fn is_live(&self, now: u64) -> bool {
        matches!(self.state, LeaseState::Pending | LeaseState::Active) && now < self.expires_at
    }

    /// True for an Active lease whose deadline has been reached.
    pub fn is_due(&self, now: u64) -> bool {
        self.state == LeaseState::Active && now >= self.expires_at
    }

    /// Returns the lease as it should be presented at `now`, regardless of
    /// whether the sweeper has recorded the expiry yet.
    pub fn observed_at(mut self, now: u64) -> Self {
        if self.is_due(now) {
            self.state = LeaseState::Expired;
        }
        self
    }
}
