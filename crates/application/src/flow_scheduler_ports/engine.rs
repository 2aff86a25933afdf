use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use tempora_core::AppResult;
use tempora_domain::{CronSchedule, FlowSpec, JobConfig, JobExecutionState};

use super::orchestrator::JobListener;

/// Data handed back to the trigger handler on every firing.
#[derive(Clone)]
pub struct TriggerPayload {
    /// Job configuration captured at install time.
    pub job_config: JobConfig,
    /// Optional completion listener.
    pub listener: Option<Arc<dyn JobListener>>,
    /// Registry entry resolved when the trigger was installed.
    pub flow_spec: Option<FlowSpec>,
}

impl Debug for TriggerPayload {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TriggerPayload")
            .field("job_config", &self.job_config)
            .field("listener", &self.listener.is_some())
            .field("flow_spec", &self.flow_spec)
            .finish()
    }
}

/// Recurring job definition installed in a scheduling engine.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    /// Job name, equal to the flow uri.
    pub job_name: String,
    /// Recurring trigger.
    pub schedule: CronSchedule,
    /// Payload passed to the handler on every firing.
    pub payload: TriggerPayload,
    /// When true, firings of this job name never overlap.
    pub disallow_concurrent_execution: bool,
}

/// Callback invoked by the engine when a trigger fires.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    /// Runs one firing and returns its terminal state, or `Pending` when the
    /// firing was skipped without running.
    async fn on_trigger(&self, job_name: &str, payload: TriggerPayload) -> JobExecutionState;

    /// Relays a best-effort interrupt request for an in-flight firing.
    async fn on_interrupt(&self, job_name: &str);
}

/// Recurring-job engine port.
#[async_trait]
pub trait SchedulingEngine: Send + Sync {
    /// Installs one job, replacing any job with the same name.
    async fn install(&self, job: ScheduledJob, handler: Arc<dyn TriggerHandler>) -> AppResult<()>;

    /// Removes one job and returns false when no such job exists.
    async fn remove(&self, job_name: &str) -> AppResult<bool>;

    /// Signals an interrupt to the job's in-flight firing, if any.
    async fn interrupt(&self, job_name: &str) -> AppResult<bool>;
}
