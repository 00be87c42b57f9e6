//! Broker tunables.

use crate::error::{BrokerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_MIN_LEASE_MINUTES: u64 = 1;
const DEFAULT_MAX_LEASE_MINUTES: u64 = 24 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;
const MILLIS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Shortest lease a caller may request
    pub min_lease_minutes: u64,
    /// Longest lease a caller may request
    pub max_lease_minutes: u64,
    /// How often the expiry sweeper runs
    pub sweep_interval_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            min_lease_minutes: DEFAULT_MIN_LEASE_MINUTES,
            max_lease_minutes: DEFAULT_MAX_LEASE_MINUTES,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl BrokerConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BrokerError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            BrokerError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_lease_minutes == 0 {
            return Err(BrokerError::InvalidConfig(
                "min_lease_minutes must be greater than 0".to_string(),
            ));
        }
        if self.min_lease_minutes > self.max_lease_minutes {
            return Err(BrokerError::InvalidConfig(format!(
                "min_lease_minutes ({}) exceeds max_lease_minutes ({})",
                self.min_lease_minutes, self.max_lease_minutes
            )));
        }
        // Lease durations are stored as u64 milliseconds
        if self.max_lease_minutes.checked_mul(MILLIS_PER_MINUTE).is_none() {
            return Err(BrokerError::InvalidConfig(format!(
                "max_lease_minutes ({}) is too large",
                self.max_lease_minutes
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(BrokerError::InvalidConfig(
                "sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bounds(&self) -> DurationBounds {
        DurationBounds {
            min: Duration::from_secs(self.min_lease_minutes.saturating_mul(60)),
            max: Duration::from_secs(self.max_lease_minutes.saturating_mul(60)),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Inclusive range of lease durations the ledger will grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationBounds {
    pub min: Duration,
    pub max: Duration,
}

impl Default for DurationBounds {
    fn default() -> Self {
        BrokerConfig::default().bounds()
    }
}

impl DurationBounds {
    pub fn check(&self, requested: Duration) -> Result<()> {
        if requested < self.min || requested > self.max {
            return Err(BrokerError::DurationOutOfRange {
                requested,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}
