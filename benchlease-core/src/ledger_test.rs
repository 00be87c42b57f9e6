#[cfg(test)]
mod tests {
    use crate::config::DurationBounds;
    use crate::error::{BrokerError, ErrorKind};
    use crate::infrastructure::LeaseStore;
    use crate::infrastructure_in_memory::InMemoryLeaseStore;
    use crate::ledger::LeaseLedger;
    use crate::registry::InMemoryRegistry;
    use crate::selector::Selector;
    use crate::types::{LeaseState, Resource};
    use std::time::Duration;

    const MINUTE: Duration = Duration::from_secs(60);
    const MINUTE_MS: u64 = 60_000;

    fn ledger() -> LeaseLedger {
        LeaseLedger::new(DurationBounds::default())
    }

    fn claim(ledger: &LeaseLedger, resource: &str, now: u64) -> crate::Result<crate::types::Lease> {
        ledger.claim(resource, 30 * MINUTE, None, &Selector::any(), now)
    }

    #[test]
    fn claim_binds_active_lease() {
        let ledger = ledger();
        let sel = Selector::parse("type=a").unwrap();
        let lease = ledger
            .claim("e1", 30 * MINUTE, Some("smoke"), &sel, 1_000)
            .unwrap();

        assert_eq!(lease.state, LeaseState::Active);
        assert_eq!(lease.resource_id, "e1");
        assert_eq!(lease.selector, "type=a");
        assert_eq!(lease.name.as_deref(), Some("smoke"));
        assert_eq!(lease.created_at, 1_000);
        assert_eq!(lease.expires_at, 1_000 + 30 * MINUTE_MS);
        assert!(lease.id.starts_with("lease_"));
    }

    #[test]
    fn second_claim_on_held_resource_is_busy() {
        let ledger = ledger();
        let first = claim(&ledger, "e1", 1_000).unwrap();

        match claim(&ledger, "e1", 2_000) {
            Err(BrokerError::ResourceBusy { resource_id, lease_id }) => {
                assert_eq!(resource_id, "e1");
                assert_eq!(lease_id, first.id);
            }
            other => panic!("expected ResourceBusy, got {:?}", other),
        }
        assert_eq!(ledger.snapshot().len(), 1);
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let ledger = ledger();
        let sel = Selector::any();
        assert!(ledger.claim("e1", MINUTE, None, &sel, 0).is_ok());
        assert!(ledger.claim("e2", 24 * 60 * MINUTE, None, &sel, 0).is_ok());

        let err = ledger
            .claim("e3", Duration::from_secs(59), None, &sel, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DurationOutOfRange);
        let err = ledger
            .claim("e3", 24 * 60 * MINUTE + Duration::from_secs(1), None, &sel, 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DurationOutOfRange);
        assert_eq!(ledger.snapshot().len(), 2);
    }

    #[test]
    fn release_frees_resource() {
        let ledger = ledger();
        let lease = claim(&ledger, "e1", 1_000).unwrap();

        let released = ledger.release(&lease.id, 2_000).unwrap();
        assert_eq!(released.state, LeaseState::Released);
        assert!(ledger.holder("e1", 2_000).is_none());

        let again = claim(&ledger, "e1", 3_000).unwrap();
        assert_ne!(again.id, lease.id);
    }

    #[test]
    fn release_unknown_lease_fails() {
        let err = ledger().release("lease_missing", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LeaseNotFound);
    }

    #[test]
    fn release_twice_is_already_terminal() {
        let ledger = ledger();
        let lease = claim(&ledger, "e1", 1_000).unwrap();
        ledger.release(&lease.id, 2_000).unwrap();

        match ledger.release(&lease.id, 3_000) {
            Err(BrokerError::AlreadyTerminal { state, .. }) => {
                assert_eq!(state, LeaseState::Released)
            }
            other => panic!("expected AlreadyTerminal, got {:?}", other),
        }
    }

    #[test]
    fn release_after_deadline_records_expiry() {
        let ledger = ledger();
        let lease = claim(&ledger, "e1", 0).unwrap();

        match ledger.release(&lease.id, lease.expires_at) {
            Err(BrokerError::AlreadyTerminal { state, .. }) => {
                assert_eq!(state, LeaseState::Expired)
            }
            other => panic!("expected AlreadyTerminal, got {:?}", other),
        }
        assert_eq!(ledger.get(&lease.id).unwrap().state, LeaseState::Expired);
    }

    #[test]
    fn claim_takes_over_from_expired_holder() {
        let ledger = ledger();
        let stale = claim(&ledger, "e1", 0).unwrap();

        // Still held one millisecond before the deadline
        assert!(claim(&ledger, "e1", stale.expires_at - 1).is_err());

        let fresh = claim(&ledger, "e1", stale.expires_at).unwrap();
        assert_eq!(ledger.get(&stale.id).unwrap().state, LeaseState::Expired);
        assert_eq!(ledger.holder("e1", stale.expires_at).unwrap().id, fresh.id);
    }

    #[test]
    fn expire_is_idempotent() {
        let ledger = ledger();
        let lease = claim(&ledger, "e1", 0).unwrap();

        assert!(ledger.expire(&lease.id).unwrap());
        assert!(!ledger.expire(&lease.id).unwrap());
        assert_eq!(ledger.get(&lease.id).unwrap().state, LeaseState::Expired);
        assert!(ledger.holder("e1", 0).is_none());
    }

    #[test]
    fn expire_does_not_resurrect_released_lease() {
        let ledger = ledger();
        let lease = claim(&ledger, "e1", 0).unwrap();
        ledger.release(&lease.id, 1).unwrap();

        assert!(!ledger.expire(&lease.id).unwrap());
        assert_eq!(ledger.get(&lease.id).unwrap().state, LeaseState::Released);
    }

    #[test]
    fn due_lists_only_active_past_deadline() {
        let ledger = ledger();
        let a = claim(&ledger, "e1", 0).unwrap();
        let b = claim(&ledger, "e2", 10 * MINUTE_MS).unwrap();
        let c = claim(&ledger, "e3", 0).unwrap();
        ledger.release(&c.id, 1).unwrap();

        assert_eq!(ledger.due(a.expires_at), vec![a.id.clone()]);
        let mut both = ledger.due(b.expires_at);
        both.sort();
        let mut expected = vec![a.id, b.id];
        expected.sort();
        assert_eq!(both, expected);
    }

    #[test]
    fn list_filters_by_current_labels_in_insertion_order() {
        let registry = InMemoryRegistry::from_resources(vec![
            Resource::new("e1").with_label("type", "a"),
            Resource::new("e2").with_label("type", "b"),
            Resource::new("e3").with_label("type", "a"),
        ]);
        let ledger = ledger();
        let l3 = claim(&ledger, "e3", 0).unwrap();
        let _l2 = claim(&ledger, "e2", 1).unwrap();
        let l1 = claim(&ledger, "e1", 2).unwrap();

        let all = ledger.list(&Selector::any(), &registry);
        assert_eq!(all.len(), 3);

        let type_a: Vec<_> = ledger
            .list(&Selector::parse("type=a").unwrap(), &registry)
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(type_a, vec![l3.id, l1.id.clone()]);

        // Relabelling an exporter changes which leases a selector finds
        registry.upsert(Resource::new("e1").with_label("type", "b"));
        let type_b = ledger.list(&Selector::parse("type=b").unwrap(), &registry);
        assert_eq!(type_b.len(), 2);
        assert!(type_b.iter().any(|l| l.id == l1.id));
    }

    #[test]
    fn list_skips_unknown_exporters_under_a_filter() {
        let registry = InMemoryRegistry::new();
        let ledger = ledger();
        claim(&ledger, "gone", 0).unwrap();

        assert_eq!(ledger.list(&Selector::any(), &registry).len(), 1);
        assert!(ledger
            .list(&Selector::parse("type=a").unwrap(), &registry)
            .is_empty());
    }

    #[test]
    fn with_store_restores_holders_and_order() {
        let ledger = ledger();
        let a = claim(&ledger, "e1", 0).unwrap();
        let b = claim(&ledger, "e2", 0).unwrap();
        ledger.release(&a.id, 1).unwrap();

        let store = InMemoryLeaseStore::with_records(ledger.snapshot());
        let restored =
            LeaseLedger::with_store(DurationBounds::default(), Box::new(store)).unwrap();

        let ids: Vec<_> = restored.snapshot().into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![a.id, b.id.clone()]);
        assert!(claim(&restored, "e1", 2).is_ok());
        assert_eq!(
            claim(&restored, "e2", 2).unwrap_err().kind(),
            ErrorKind::ResourceBusy
        );
    }

    #[test]
    fn with_store_rejects_two_live_leases_on_one_exporter() {
        let first = ledger();
        let a = claim(&first, "e1", 0).unwrap();
        let second = ledger();
        let b = claim(&second, "e1", 0).unwrap();
        assert_ne!(a.id, b.id);

        let store = InMemoryLeaseStore::with_records(vec![a, b]);
        let err = LeaseLedger::with_store(DurationBounds::default(), Box::new(store))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    // =========================================================================
    // Store failure rollback
    // =========================================================================

    struct FailingStore {
        inner: InMemoryLeaseStore,
        fail: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl LeaseStore for FailingStore {
        fn load_all(&mut self) -> Result<Vec<crate::types::Lease>, crate::error::StoreError> {
            self.inner.load_all()
        }

        fn save(&mut self, lease: &crate::types::Lease) -> Result<(), crate::error::StoreError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.save(lease)
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[test]
    fn store_failure_leaves_state_unchanged() {
        let fail = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let store = FailingStore {
            inner: InMemoryLeaseStore::new(),
            fail: fail.clone(),
        };
        let ledger = LeaseLedger::with_store(DurationBounds::default(), Box::new(store)).unwrap();
        let held = claim(&ledger, "e1", 0).unwrap();

        fail.store(true, std::sync::atomic::Ordering::SeqCst);
        assert_eq!(claim(&ledger, "e2", 0).unwrap_err().kind(), ErrorKind::Store);
        assert_eq!(
            ledger.release(&held.id, 1).unwrap_err().kind(),
            ErrorKind::Store
        );
        assert_eq!(ledger.snapshot().len(), 1);
        assert_eq!(ledger.get(&held.id).unwrap().state, LeaseState::Active);
        assert!(ledger.holder("e1", 1).is_some());

        fail.store(false, std::sync::atomic::Ordering::SeqCst);
        assert!(claim(&ledger, "e2", 0).is_ok());
    }
}
