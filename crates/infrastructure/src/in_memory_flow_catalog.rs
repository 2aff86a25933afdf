use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tempora_application::{FlowCatalog, SpecCatalogListener};
use tempora_core::AppResult;
use tempora_domain::Spec;
use tokio::sync::RwLock;

use crate::spec_listener_registry::SpecListenerRegistry;

/// In-memory spec catalog used by single-process deployments and tests.
///
/// `put_spec` and `delete_spec` notify registered listeners once the store lock
/// is released. `FlowCatalog::remove_spec` is the scheduler's cleanup path and
/// stays silent so a delete never loops back into the listener.
#[derive(Default)]
pub struct InMemoryFlowCatalog {
    specs: RwLock<HashMap<String, Spec>>,
    listeners: SpecListenerRegistry,
}

impl InMemoryFlowCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for subsequent changes.
    pub async fn register_listener(&self, listener: Arc<dyn SpecCatalogListener>) {
        self.listeners.register(listener).await;
    }

    /// Adds or replaces one spec, then notifies listeners.
    pub async fn put_spec(&self, spec: Spec) {
        let existed = self
            .specs
            .write()
            .await
            .insert(spec.uri().to_owned(), spec.clone())
            .is_some();

        if existed {
            self.listeners.notify_updated(&spec).await;
        } else {
            self.listeners.notify_added(&spec).await;
        }
    }

    /// Deletes one spec and notifies listeners when it existed.
    pub async fn delete_spec(&self, uri: &str) -> bool {
        let removed = self.specs.write().await.remove(uri);

        match removed {
            Some(spec) => {
                self.listeners
                    .notify_deleted(spec.uri(), spec.version())
                    .await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl FlowCatalog for InMemoryFlowCatalog {
    async fn list_specs(&self) -> AppResult<Vec<Spec>> {
        let mut specs: Vec<Spec> = self.specs.read().await.values().cloned().collect();
        specs.sort_by(|left, right| left.uri().cmp(right.uri()));
        Ok(specs)
    }

    async fn get_spec(&self, uri: &str) -> AppResult<Option<Spec>> {
        Ok(self.specs.read().await.get(uri).cloned())
    }

    async fn remove_spec(&self, uri: &str) -> AppResult<bool> {
        Ok(self.specs.write().await.remove(uri).is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tempora_application::{FlowCatalog, SpecCatalogListener};
    use tempora_domain::{FlowSpec, FlowSpecInput, Spec, TopologySpec};
    use tokio::sync::Mutex;

    use super::InMemoryFlowCatalog;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpecCatalogListener for RecordingListener {
        async fn on_add_spec(&self, spec: &Spec) {
            self.events.lock().await.push(format!("add {spec}"));
        }

        async fn on_update_spec(&self, spec: &Spec) {
            self.events.lock().await.push(format!("update {spec}"));
        }

        async fn on_delete_spec(&self, uri: &str, version: &str) {
            self.events
                .lock()
                .await
                .push(format!("delete {uri}/{version}"));
        }
    }

    fn flow(uri: &str, version: &str) -> Spec {
        Spec::Flow(
            FlowSpec::new(FlowSpecInput {
                uri: uri.to_owned(),
                version: version.to_owned(),
                description: None,
                properties: BTreeMap::new(),
            })
            .unwrap_or_else(|_| unreachable!()),
        )
    }

    async fn catalog_with_listener() -> (InMemoryFlowCatalog, Arc<RecordingListener>) {
        let catalog = InMemoryFlowCatalog::new();
        let listener = Arc::new(RecordingListener::default());
        catalog.register_listener(listener.clone()).await;
        (catalog, listener)
    }

    #[tokio::test]
    async fn put_notifies_add_then_update() {
        let (catalog, listener) = catalog_with_listener().await;

        catalog.put_spec(flow("flow://A", "1")).await;
        catalog.put_spec(flow("flow://A", "2")).await;

        assert_eq!(
            listener.events.lock().await.clone(),
            vec![
                "add flow:flow://A/1".to_owned(),
                "update flow:flow://A/2".to_owned(),
            ]
        );
        let stored = catalog.get_spec("flow://A").await;
        assert_eq!(
            stored.map(|spec| spec.map(|spec| spec.version().to_owned())),
            Ok(Some("2".to_owned()))
        );
    }

    #[tokio::test]
    async fn delete_notifies_only_when_spec_existed() {
        let (catalog, listener) = catalog_with_listener().await;
        catalog.put_spec(flow("flow://A", "3")).await;

        assert!(catalog.delete_spec("flow://A").await);
        assert!(!catalog.delete_spec("flow://A").await);

        assert_eq!(
            listener.events.lock().await.clone(),
            vec![
                "add flow:flow://A/3".to_owned(),
                "delete flow://A/3".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn port_removal_is_silent() {
        let (catalog, listener) = catalog_with_listener().await;
        catalog.put_spec(flow("flow://A", "1")).await;

        assert_eq!(catalog.remove_spec("flow://A").await, Ok(true));
        assert_eq!(catalog.remove_spec("flow://A").await, Ok(false));
        assert_eq!(listener.events.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn list_returns_all_kinds_sorted_by_uri() {
        let catalog = InMemoryFlowCatalog::new();
        catalog.put_spec(flow("flow://B", "1")).await;
        catalog
            .put_spec(Spec::Topology(
                TopologySpec::new("topology://local", "1", None)
                    .unwrap_or_else(|_| unreachable!()),
            ))
            .await;
        catalog.put_spec(flow("flow://A", "1")).await;

        let uris: Vec<String> = catalog
            .list_specs()
            .await
            .unwrap_or_else(|_| unreachable!())
            .iter()
            .map(|spec| spec.uri().to_owned())
            .collect();
        assert_eq!(uris, vec!["flow://A", "flow://B", "topology://local"]);
    }
}
