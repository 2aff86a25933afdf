use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tempora_core::{AppError, AppResult};
use tempora_domain::{
    ControllerMessage, ControllerMessageType, DispatchDecision, DispatchInput, JobConfig, Spec,
    decide_dispatch, should_forward,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::flow_job_executor::{FlowJobExecutor, JobExecutionTracker};
use crate::flow_scheduler_ports::{
    ClusterCoordinator, FlowCatalog, FlowOrchestrator, FlowRunOutcome, FlowSchedulerError,
    JobListener, ScheduledJob, SchedulingEngine, SpecCatalogListener, TriggerPayload,
};
use crate::immediate_run_dispatcher::{ImmediateRunDispatcher, JobRunner};

mod controller_messages;
mod jobs;
mod leadership;
mod lifecycle;
mod registry;

use registry::SpecRegistry;

/// Leadership flag and registry, mutated together under one lock.
#[derive(Debug, Default)]
struct SchedulerState {
    is_active: bool,
    registry: SpecRegistry,
}

/// Keeps catalog flows mirrored into the scheduling engine on the leader node
/// and forwards lifecycle events to the controller role everywhere else.
#[derive(Clone)]
pub struct FlowSchedulerService {
    state: Arc<Mutex<SchedulerState>>,
    engine: Arc<dyn SchedulingEngine>,
    orchestrator: Arc<dyn FlowOrchestrator>,
    catalog: Option<Arc<dyn FlowCatalog>>,
    cluster: Option<Arc<dyn ClusterCoordinator>>,
    immediate_runs: ImmediateRunDispatcher,
    executions: Arc<JobExecutionTracker>,
    base_properties: Arc<BTreeMap<String, String>>,
}

impl FlowSchedulerService {
    /// Creates a standby scheduler in single-node mode with no catalog.
    #[must_use]
    pub fn new(engine: Arc<dyn SchedulingEngine>, orchestrator: Arc<dyn FlowOrchestrator>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::default())),
            engine,
            orchestrator,
            catalog: None,
            cluster: None,
            immediate_runs: ImmediateRunDispatcher::default(),
            executions: Arc::new(JobExecutionTracker::new()),
            base_properties: Arc::new(BTreeMap::new()),
        }
    }

    /// Adds the flow catalog used for re-dispatch and cleanup.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn FlowCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Enables cluster mode with a coordination channel to the controller role.
    #[must_use]
    pub fn with_cluster_coordinator(mut self, cluster: Arc<dyn ClusterCoordinator>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Sets base service properties merged into every job config.
    #[must_use]
    pub fn with_base_properties(mut self, base_properties: BTreeMap<String, String>) -> Self {
        self.base_properties = Arc::new(base_properties);
        self
    }

    /// Replaces the immediate-run pool.
    #[must_use]
    pub fn with_immediate_run_dispatcher(mut self, dispatcher: ImmediateRunDispatcher) -> Self {
        self.immediate_runs = dispatcher;
        self
    }

    /// Returns true when a cluster coordination channel is configured.
    #[must_use]
    pub fn is_cluster_mode(&self) -> bool {
        self.cluster.is_some()
    }

    /// Returns the current leadership flag.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.is_active
    }

    /// Returns the uris this node currently has scheduled, sorted.
    pub async fn scheduled_flow_uris(&self) -> Vec<String> {
        self.state.lock().await.registry.uris()
    }

    /// Returns the tracker holding the latest firing state per job.
    #[must_use]
    pub fn job_executions(&self) -> Arc<JobExecutionTracker> {
        self.executions.clone()
    }

    async fn forward(&self, message: ControllerMessage, flow_uri: &str) {
        let Some(cluster) = &self.cluster else {
            return;
        };

        let message_type = message.message_type;
        let correlation_id = message.correlation_id;
        match cluster.try_send(message).await {
            Ok(()) => info!(
                flow_uri = %flow_uri,
                message_type = message_type.as_str(),
                correlation_id = %correlation_id,
                "forwarded spec event to controller"
            ),
            Err(source) => {
                let error = FlowSchedulerError::Forward {
                    flow_uri: flow_uri.to_owned(),
                    source,
                };
                warn!(
                    flow_uri = %flow_uri,
                    message_type = message_type.as_str(),
                    correlation_id = %correlation_id,
                    error = %error,
                    cause = %error.cause(),
                    "failed to forward spec event"
                );
            }
        }
    }

    fn job_runner(&self) -> Arc<dyn JobRunner> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl JobRunner for FlowSchedulerService {
    async fn run_job(
        &self,
        job_config: &JobConfig,
        listener: Option<Arc<dyn JobListener>>,
    ) -> Result<(), FlowSchedulerError> {
        FlowSchedulerService::run_job(self, job_config, listener).await
    }

    async fn accepts_triggered_runs(&self) -> bool {
        !should_forward(self.is_active().await, self.is_cluster_mode())
    }
}

#[async_trait]
impl SpecCatalogListener for FlowSchedulerService {
    async fn on_add_spec(&self, spec: &Spec) {
        FlowSchedulerService::on_add_spec(self, spec).await;
    }

    async fn on_update_spec(&self, spec: &Spec) {
        FlowSchedulerService::on_update_spec(self, spec).await;
    }

    async fn on_delete_spec(&self, uri: &str, version: &str) {
        FlowSchedulerService::on_delete_spec(self, uri, version).await;
    }
}
