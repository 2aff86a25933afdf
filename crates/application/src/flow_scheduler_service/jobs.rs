use super::*;

impl FlowSchedulerService {
    /// Installs the recurring trigger for a job, attaching its registry entry.
    pub async fn schedule_job(
        &self,
        job_config: &JobConfig,
        listener: Option<Arc<dyn JobListener>>,
    ) -> Result<(), FlowSchedulerError> {
        let state = self.state.lock().await;
        self.schedule_job_locked(&state, job_config, listener).await
    }

    /// Resolves the job's flow spec and hands it to the execution engine.
    ///
    /// The registry entry wins; a spec snapshot attached to the config covers
    /// flows that run once without being registered.
    pub async fn run_job(
        &self,
        job_config: &JobConfig,
        listener: Option<Arc<dyn JobListener>>,
    ) -> Result<(), FlowSchedulerError> {
        let job_name = job_config.job_name().to_owned();
        let registered = self.state.lock().await.registry.get(&job_name).cloned();
        let flow_spec = registered
            .or_else(|| job_config.flow_spec().cloned())
            .ok_or_else(|| FlowSchedulerError::Run {
                job_name: job_name.clone(),
                source: AppError::NotFound(format!("no flow spec registered for '{job_name}'")),
            })?;

        let result = self.orchestrator.orchestrate(&flow_spec).await;

        if let Some(listener) = listener {
            let outcome = match &result {
                Ok(()) => FlowRunOutcome::Succeeded,
                Err(error) => FlowRunOutcome::Failed {
                    reason: error.to_string(),
                },
            };
            listener.on_job_completion(&job_name, &outcome).await;
        }

        result.map_err(|source| FlowSchedulerError::Run { job_name, source })
    }

    /// Relays a best-effort interrupt to the job's in-flight firing.
    pub async fn interrupt_job(&self, job_name: &str) -> Result<bool, FlowSchedulerError> {
        self.engine
            .interrupt(job_name)
            .await
            .map_err(|source| FlowSchedulerError::Scheduling {
                job_name: job_name.to_owned(),
                source,
            })
    }

    pub(super) async fn schedule_job_locked(
        &self,
        state: &SchedulerState,
        job_config: &JobConfig,
        listener: Option<Arc<dyn JobListener>>,
    ) -> Result<(), FlowSchedulerError> {
        let job_name = job_config.job_name().to_owned();
        let scheduling_error = |source: AppError| FlowSchedulerError::Scheduling {
            job_name: job_name.clone(),
            source,
        };

        let schedule = job_config
            .schedule()
            .and_then(|schedule| {
                schedule.ok_or_else(|| {
                    AppError::Validation(format!("job '{job_name}' has no schedule"))
                })
            })
            .map_err(scheduling_error)?;

        let job = ScheduledJob {
            job_name: job_name.clone(),
            schedule,
            payload: TriggerPayload {
                job_config: job_config.clone(),
                listener,
                flow_spec: state.registry.get(&job_name).cloned(),
            },
            disallow_concurrent_execution: true,
        };
        let handler = Arc::new(FlowJobExecutor::new(
            self.job_runner(),
            self.executions.clone(),
        ));

        self.engine
            .install(job, handler)
            .await
            .map_err(scheduling_error)
    }
}
