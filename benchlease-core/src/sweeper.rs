//! Background expiry of leases past their deadline.
//!
//! The sweeper is an optimisation, not a correctness mechanism: readers
//! already treat a lease past its deadline as expired. Sweeping only makes
//! the recorded state catch up.

use crate::clock::Clock;
use crate::ledger::LeaseLedger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// tokio::time::interval panics on a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct ExpirySweeper {
    ledger: Arc<LeaseLedger>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(ledger: Arc<LeaseLedger>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            ledger,
            clock,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Expire every Active lease whose deadline has passed. Returns the
    /// number of leases this pass moved to Expired.
    pub fn sweep_once(&self) -> usize {
        let now = self.clock.now_ms();
        let mut expired = 0;

        for lease_id in self.ledger.due(now) {
            match self.ledger.expire(&lease_id) {
                Ok(true) => expired += 1,
                // Released or expired by someone else since `due` ran
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(lease_id = %lease_id, error = %e, "Failed to expire lease");
                }
            }
        }

        if expired > 0 {
            tracing::info!(expired, "Expired leases swept");
        } else {
            tracing::debug!("Sweep found nothing to expire");
        }
        expired
    }

    /// Run the sweeper on the current tokio runtime until the returned
    /// handle is shut down.
    pub fn spawn(self) -> SweeperHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    _ = &mut stop_rx => break,
                }
            }
            tracing::debug!("Sweeper stopped");
        });

        SweeperHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Owner of a running sweeper task.
pub struct SweeperHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to finish its current pass.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(error = %e, "Sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.task.abort();
        }
    }
}
