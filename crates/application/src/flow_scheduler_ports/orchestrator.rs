use async_trait::async_trait;
use tempora_core::AppResult;
use tempora_domain::FlowSpec;

/// Result reported to job listeners once a run returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowRunOutcome {
    /// The execution engine accepted and finished the run.
    Succeeded,
    /// The execution engine failed the run.
    Failed {
        /// Failure description.
        reason: String,
    },
}

/// Execution engine port that runs a resolved flow.
#[async_trait]
pub trait FlowOrchestrator: Send + Sync {
    /// Transfers control of one flow run to the execution engine.
    async fn orchestrate(&self, flow_spec: &FlowSpec) -> AppResult<()>;
}

/// Observer notified when a job run returns.
#[async_trait]
pub trait JobListener: Send + Sync {
    /// Called once per run with its outcome.
    async fn on_job_completion(&self, job_name: &str, outcome: &FlowRunOutcome);
}
