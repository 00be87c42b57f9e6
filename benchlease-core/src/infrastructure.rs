use crate::error::StoreError;
use crate::types::Lease;

/// Persistence collaborator for the lease ledger.
///
/// Records are keyed by lease ID. The ledger calls `save` inside its
/// critical section after every state change, and `load_all` once when it
/// is constructed.
pub trait LeaseStore: Send {
    /// Every stored lease, oldest first
    fn load_all(&mut self) -> Result<Vec<Lease>, StoreError>;

    /// Insert or overwrite the record for `lease.id`
    fn save(&mut self, lease: &Lease) -> Result<(), StoreError>;

    /// Short human-readable description of the backend
    fn describe(&self) -> String;
}
