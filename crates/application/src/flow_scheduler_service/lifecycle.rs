use super::*;

impl FlowSchedulerService {
    /// Handles a spec added to the catalog. Never fails back to the caller.
    pub async fn on_add_spec(&self, spec: &Spec) {
        info!(spec = %spec, "new spec detected");

        let mut state = self.state.lock().await;
        self.add_spec_locked(&mut state, spec).await;
    }

    /// Handles a spec removed from the catalog. Never fails back to the caller.
    ///
    /// After a local unschedule the catalog entry is removed as well, since the
    /// deletion may come from a source other than the catalog itself.
    pub async fn on_delete_spec(&self, uri: &str, version: &str) {
        info!(flow_uri = %uri, version = %version, "spec deletion detected");

        let acted_locally = {
            let mut state = self.state.lock().await;
            self.delete_spec_locked(&mut state, uri, version).await
        };

        if acted_locally {
            self.remove_from_catalog(uri).await;
        }
    }

    /// Handles a changed spec as delete-then-add. Never fails back to the caller.
    pub async fn on_update_spec(&self, spec: &Spec) {
        info!(spec = %spec, "spec changed");

        let Some(flow_spec) = spec.as_flow() else {
            return;
        };

        let mut state = self.state.lock().await;
        if should_forward(state.is_active, self.is_cluster_mode()) {
            self.forward(
                ControllerMessage::flow_spec_remove(flow_spec.uri(), flow_spec.version()),
                flow_spec.uri(),
            )
            .await;
            self.forward(ControllerMessage::flow_spec_add(flow_spec.uri()), flow_spec.uri())
                .await;
            return;
        }

        // The catalog already holds the new version, so only the schedule is torn down.
        self.unschedule_locked(&mut state, flow_spec.uri()).await;
        self.add_spec_locked(&mut state, spec).await;
    }

    pub(super) async fn add_spec_locked(&self, state: &mut SchedulerState, spec: &Spec) {
        let Some(flow_spec) = spec.as_flow() else {
            debug!(spec = %spec, "ignoring non-flow spec");
            return;
        };

        let job_config = JobConfig::for_flow(&self.base_properties, flow_spec)
            .with_flow_spec(flow_spec.clone());
        let decision = decide_dispatch(DispatchInput {
            is_active: state.is_active,
            cluster_present: self.is_cluster_mode(),
            has_schedule: job_config.has_schedule(),
            run_immediately: job_config.run_immediately(),
        });

        if decision == DispatchDecision::Forward {
            self.forward(ControllerMessage::flow_spec_add(flow_spec.uri()), flow_spec.uri())
                .await;
            return;
        }

        if decision.installs_trigger() {
            info!(flow_uri = %flow_spec.uri(), version = %flow_spec.version(), "scheduling flow spec");
            state.registry.insert(flow_spec.clone());

            if let Err(error) = self.schedule_job_locked(state, &job_config, None).await {
                state.registry.remove(flow_spec.uri());
                error!(
                    flow_uri = %flow_spec.uri(),
                    version = %flow_spec.version(),
                    error = %error,
                    cause = %error.cause(),
                    "failed to schedule flow spec"
                );
                return;
            }
        }

        if decision.runs_once() {
            if decision.installs_trigger() {
                info!(flow_uri = %flow_spec.uri(), "run immediately requested, executing flow spec");
            } else {
                info!(flow_uri = %flow_spec.uri(), "no schedule found, running flow spec once");
            }
            self.immediate_runs
                .submit(self.job_runner(), job_config, None);
        }
    }

    /// Returns true when the deletion was handled locally rather than forwarded.
    pub(super) async fn delete_spec_locked(
        &self,
        state: &mut SchedulerState,
        uri: &str,
        version: &str,
    ) -> bool {
        if should_forward(state.is_active, self.is_cluster_mode()) {
            self.forward(ControllerMessage::flow_spec_remove(uri, version), uri)
                .await;
            return false;
        }

        self.unschedule_locked(state, uri).await;
        true
    }

    /// Drops the registry entry first, then asks the engine to remove the job.
    pub(super) async fn unschedule_locked(&self, state: &mut SchedulerState, uri: &str) {
        if state.registry.remove(uri).is_none() {
            debug!(flow_uri = %uri, "flow was not in the registry");
        }
        self.executions.forget(uri).await;

        match self.engine.remove(uri).await {
            Ok(true) => info!(flow_uri = %uri, "unscheduled flow spec"),
            Ok(false) => warn!(flow_uri = %uri, "no scheduled job found for flow spec"),
            Err(source) => {
                let error = FlowSchedulerError::Scheduling {
                    job_name: uri.to_owned(),
                    source,
                };
                warn!(
                    flow_uri = %uri,
                    error = %error,
                    cause = %error.cause(),
                    "flow spec was not unscheduled cleanly"
                );
            }
        }
    }

    async fn remove_from_catalog(&self, uri: &str) {
        let Some(catalog) = &self.catalog else {
            return;
        };

        match catalog.remove_spec(uri).await {
            Ok(true) => debug!(flow_uri = %uri, "removed flow spec from catalog"),
            Ok(false) => debug!(flow_uri = %uri, "flow spec already absent from catalog"),
            Err(source) => {
                let error = FlowSchedulerError::CatalogCleanup {
                    flow_uri: uri.to_owned(),
                    source,
                };
                warn!(
                    flow_uri = %uri,
                    error = %error,
                    cause = %error.cause(),
                    "flow spec was not removed from catalog cleanly"
                );
            }
        }
    }
}
