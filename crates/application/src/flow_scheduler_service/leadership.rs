use super::*;

impl FlowSchedulerService {
    /// Moves this node between active and standby.
    ///
    /// Becoming active re-dispatches every catalog spec, since nothing was
    /// tracked while standby. Becoming standby hands every scheduled flow to the
    /// controller role: the flag flips first, so each delete takes the forward
    /// path. Local triggers stay installed but their firings are skipped until
    /// this node leads again.
    pub async fn set_leadership(&self, active: bool) {
        let mut state = self.state.lock().await;
        if state.is_active == active {
            debug!(active, "leadership unchanged");
            return;
        }

        state.is_active = active;
        info!(active, scheduled = state.registry.len(), "leadership changed");

        if active {
            let Some(catalog) = &self.catalog else {
                return;
            };

            match catalog.list_specs().await {
                Ok(specs) => {
                    info!(count = specs.len(), "re-dispatching catalog specs");
                    for spec in &specs {
                        self.add_spec_locked(&mut state, spec).await;
                    }
                }
                Err(error) => {
                    error!(error = %error, "failed to enumerate catalog specs");
                }
            }
        } else {
            for (uri, version) in state.registry.entries() {
                self.delete_spec_locked(&mut state, uri.as_str(), version.as_str())
                    .await;
            }
        }
    }
}
