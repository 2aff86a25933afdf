use async_trait::async_trait;
use tempora_core::AppResult;
use tempora_domain::Spec;

/// Durable store of specs consulted by the scheduler.
#[async_trait]
pub trait FlowCatalog: Send + Sync {
    /// Lists every spec currently known to the catalog.
    async fn list_specs(&self) -> AppResult<Vec<Spec>>;

    /// Finds one spec by uri.
    async fn get_spec(&self, uri: &str) -> AppResult<Option<Spec>>;

    /// Removes one spec and returns false when it was not present.
    async fn remove_spec(&self, uri: &str) -> AppResult<bool>;
}

/// Receiver of catalog change notifications.
///
/// Implementations must not fail back into the catalog: every callback is a
/// terminal boundary that absorbs and logs its own errors.
#[async_trait]
pub trait SpecCatalogListener: Send + Sync {
    /// Called after a spec was added.
    async fn on_add_spec(&self, spec: &Spec);

    /// Called after an existing spec changed.
    async fn on_update_spec(&self, spec: &Spec);

    /// Called after a spec was removed.
    async fn on_delete_spec(&self, uri: &str, version: &str);
}
