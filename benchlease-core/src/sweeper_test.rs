#[cfg(test)]
mod tests {
    use crate::clock::{Clock, ManualClock};
    use crate::config::DurationBounds;
    use crate::ledger::LeaseLedger;
    use crate::selector::Selector;
    use crate::sweeper::ExpirySweeper;
    use crate::types::LeaseState;
    use std::sync::Arc;
    use std::time::Duration;

    const MINUTE: Duration = Duration::from_secs(60);
    const TICK: Duration = Duration::from_secs(5);

    fn setup() -> (Arc<LeaseLedger>, Arc<ManualClock>) {
        (
            Arc::new(LeaseLedger::new(DurationBounds::default())),
            Arc::new(ManualClock::new(0)),
        )
    }

    #[test]
    fn sweep_once_expires_only_due_leases() {
        let (ledger, clock) = setup();
        let short = ledger
            .claim("e1", MINUTE, None, &Selector::any(), 0)
            .unwrap();
        let long = ledger
            .claim("e2", 10 * MINUTE, None, &Selector::any(), 0)
            .unwrap();
        let sweeper = ExpirySweeper::new(ledger.clone(), clock.clone(), TICK);

        assert_eq!(sweeper.sweep_once(), 0);

        clock.set(short.expires_at);
        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(ledger.get(&short.id).unwrap().state, LeaseState::Expired);
        assert_eq!(ledger.get(&long.id).unwrap().state, LeaseState::Active);

        // Nothing left to do on a second pass
        assert_eq!(sweeper.sweep_once(), 0);
    }

    #[test]
    fn sweep_skips_released_leases() {
        let (ledger, clock) = setup();
        let lease = ledger
            .claim("e1", MINUTE, None, &Selector::any(), 0)
            .unwrap();
        ledger.release(&lease.id, 1).unwrap();

        clock.set(lease.expires_at + 1);
        let sweeper = ExpirySweeper::new(ledger.clone(), clock, TICK);
        assert_eq!(sweeper.sweep_once(), 0);
        assert_eq!(ledger.get(&lease.id).unwrap().state, LeaseState::Released);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_expires_on_its_interval() {
        let (ledger, clock) = setup();
        let lease = ledger
            .claim("e1", MINUTE, None, &Selector::any(), 0)
            .unwrap();
        let handle = ExpirySweeper::new(ledger.clone(), clock.clone(), TICK).spawn();

        tokio::time::sleep(TICK + Duration::from_secs(1)).await;
        assert_eq!(ledger.get(&lease.id).unwrap().state, LeaseState::Active);

        clock.set(lease.expires_at);
        tokio::time::sleep(TICK).await;
        assert_eq!(ledger.get(&lease.id).unwrap().state, LeaseState::Expired);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_sweeping() {
        let (ledger, clock) = setup();
        let handle = ExpirySweeper::new(ledger.clone(), clock.clone(), TICK).spawn();
        assert!(!handle.is_finished());
        handle.shutdown().await;

        let lease = ledger
            .claim("e1", MINUTE, None, &Selector::any(), 0)
            .unwrap();
        clock.set(lease.expires_at);
        tokio::time::sleep(4 * TICK).await;

        // Recorded state lags; only readers see the expiry
        let stored = ledger.get(&lease.id).unwrap();
        assert_eq!(stored.state, LeaseState::Active);
        assert_eq!(stored.observed_at(clock.now_ms()).state, LeaseState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped() {
        let (ledger, clock) = setup();
        let sweeper = ExpirySweeper::new(ledger.clone(), clock.clone(), Duration::ZERO);
        assert_eq!(sweeper.interval(), Duration::from_millis(1));

        let lease = ledger
            .claim("e1", MINUTE, None, &Selector::any(), 0)
            .unwrap();
        let handle = sweeper.spawn();
        clock.set(lease.expires_at);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(!handle.is_finished());
        assert_eq!(ledger.get(&lease.id).unwrap().state, LeaseState::Expired);
        handle.shutdown().await;
    }
}
