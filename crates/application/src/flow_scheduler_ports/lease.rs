use async_trait::async_trait;
use tempora_core::AppResult;

/// One held leadership lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadershipLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release and renewal.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Distributed coordination port used to elect the controller node.
#[async_trait]
pub trait LeadershipLeaseCoordinator: Send + Sync {
    /// Attempts to acquire the lease for the given scope.
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<LeadershipLease>>;

    /// Releases the lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &LeadershipLease) -> AppResult<()>;

    /// Renews the lease and returns false when token ownership changed.
    async fn renew_lease(&self, lease: &LeadershipLease, lease_seconds: u32) -> AppResult<bool>;
}
