use std::sync::Arc;

use async_trait::async_trait;
use tempora_domain::JobConfig;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::flow_scheduler_ports::{FlowSchedulerError, JobListener};

/// Anything able to run one job by configuration.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Runs one job to completion.
    async fn run_job(
        &self,
        job_config: &JobConfig,
        listener: Option<Arc<dyn JobListener>>,
    ) -> Result<(), FlowSchedulerError>;

    /// Returns false while recurring firings must be skipped on this node.
    async fn accepts_triggered_runs(&self) -> bool {
        true
    }
}

/// Background pool for one-off runs, separate from the engine's trigger pool.
#[derive(Clone)]
pub struct ImmediateRunDispatcher {
    permits: Arc<Semaphore>,
    worker_count: usize,
}

impl ImmediateRunDispatcher {
    /// Creates a dispatcher that runs at most `worker_count` jobs at once.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        Self {
            permits: Arc::new(Semaphore::new(worker_count)),
            worker_count,
        }
    }

    /// Returns the configured pool size.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Queues one run. Never waits for the run and never reports its failure
    /// back to the submitter.
    pub fn submit(
        &self,
        runner: Arc<dyn JobRunner>,
        job_config: JobConfig,
        listener: Option<Arc<dyn JobListener>>,
    ) {
        let permits = self.permits.clone();
        tokio::spawn(async move {
            let job_name = job_config.job_name().to_owned();
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(error) => {
                    warn!(job_name = %job_name, error = %error, "immediate run pool is closed");
                    return;
                }
            };

            debug!(job_name = %job_name, "running non-scheduled job");
            if let Err(error) = runner.run_job(&job_config, listener).await {
                error!(
                    job_name = %job_name,
                    error = %error,
                    cause = %error.cause(),
                    "failed to run job"
                );
            }
        });
    }
}

impl Default for ImmediateRunDispatcher {
    fn default() -> Self {
        Self::new(4)
    }
}
