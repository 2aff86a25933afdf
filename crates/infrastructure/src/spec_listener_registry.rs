use std::sync::Arc;

use tempora_application::SpecCatalogListener;
use tempora_domain::Spec;
use tokio::sync::RwLock;

/// Fan-out list of catalog listeners shared by the catalog adapters.
#[derive(Default)]
pub(crate) struct SpecListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn SpecCatalogListener>>>,
}

impl SpecListenerRegistry {
    pub(crate) async fn register(&self, listener: Arc<dyn SpecCatalogListener>) {
        self.listeners.write().await.push(listener);
    }

    async fn snapshot(&self) -> Vec<Arc<dyn SpecCatalogListener>> {
        self.listeners.read().await.clone()
    }

    pub(crate) async fn notify_added(&self, spec: &Spec) {
        for listener in self.snapshot().await {
            listener.on_add_spec(spec).await;
        }
    }

    pub(crate) async fn notify_updated(&self, spec: &Spec) {
        for listener in self.snapshot().await {
            listener.on_update_spec(spec).await;
        }
    }

    pub(crate) async fn notify_deleted(&self, uri: &str, version: &str) {
        for listener in self.snapshot().await {
            listener.on_delete_spec(uri, version).await;
        }
    }
}
