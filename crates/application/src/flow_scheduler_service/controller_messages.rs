use super::*;

impl FlowSchedulerService {
    /// Applies one notice forwarded by a standby node.
    ///
    /// Removals are reconciled against the catalog: a flow the catalog still
    /// holds was handed off rather than deleted, so its schedule stays.
    pub async fn handle_controller_message(&self, message: ControllerMessage) {
        if !self.is_active().await {
            warn!(
                correlation_id = %message.correlation_id,
                message_type = message.message_type.as_str(),
                "ignoring forwarded spec event while standby"
            );
            return;
        }

        match message.message_type {
            ControllerMessageType::FlowSpecAdd => {
                let uri = message.payload.as_str();
                match self.lookup_catalog_spec(uri).await {
                    Ok(Some(spec)) => self.on_add_spec(&spec).await,
                    Ok(None) => warn!(
                        flow_uri = %uri,
                        correlation_id = %message.correlation_id,
                        "forwarded flow spec is not in the catalog"
                    ),
                    Err(error) => warn!(
                        flow_uri = %uri,
                        correlation_id = %message.correlation_id,
                        error = %error,
                        "failed to resolve forwarded flow spec"
                    ),
                }
            }
            ControllerMessageType::FlowSpecRemove => {
                let (uri, version) = match message.removed_uri_and_version() {
                    Ok(parts) => parts,
                    Err(error) => {
                        warn!(
                            correlation_id = %message.correlation_id,
                            error = %error,
                            "malformed forwarded removal"
                        );
                        return;
                    }
                };

                match self.lookup_catalog_spec(uri).await {
                    Ok(Some(_)) => info!(
                        flow_uri = %uri,
                        version = %version,
                        "flow spec still in catalog, keeping schedule"
                    ),
                    Ok(None) => {
                        let mut state = self.state.lock().await;
                        if !state.is_active {
                            warn!(
                                flow_uri = %uri,
                                correlation_id = %message.correlation_id,
                                "leadership lost during forwarded removal, keeping schedule"
                            );
                            return;
                        }
                        self.unschedule_locked(&mut state, uri).await;
                    }
                    Err(error) => warn!(
                        flow_uri = %uri,
                        error = %error,
                        "failed to reconcile forwarded removal"
                    ),
                }
            }
        }
    }

    async fn lookup_catalog_spec(&self, uri: &str) -> AppResult<Option<Spec>> {
        match &self.catalog {
            Some(catalog) => catalog.get_spec(uri).await,
            None => Ok(None),
        }
    }
}
