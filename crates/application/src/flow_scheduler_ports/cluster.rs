use async_trait::async_trait;
use tempora_core::AppResult;
use tempora_domain::ControllerMessage;

/// Best-effort channel from standby nodes to the controller role.
#[async_trait]
pub trait ClusterCoordinator: Send + Sync {
    /// Sends one notice without delivery or ordering guarantees.
    async fn try_send(&self, message: ControllerMessage) -> AppResult<()>;
}

/// Controller-side view of forwarded notices.
#[async_trait]
pub trait ControllerInbox: Send + Sync {
    /// Takes up to `limit` pending notices in arrival order.
    async fn receive(&self, limit: usize) -> AppResult<Vec<ControllerMessage>>;
}
