use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tempora_domain::{JobExecutionEvent, JobExecutionState};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::flow_scheduler_ports::{TriggerHandler, TriggerPayload};
use crate::immediate_run_dispatcher::JobRunner;

#[derive(Debug, Clone, Copy, Default)]
struct JobExecution {
    state: JobExecutionState,
    interrupt_requested: bool,
    forget_on_finish: bool,
}

/// Latest execution state per job name, shared by every installed trigger.
#[derive(Debug, Default)]
pub struct JobExecutionTracker {
    executions: Mutex<HashMap<String, JobExecution>>,
}

impl JobExecutionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state of the latest execution for one job name.
    pub async fn state_of(&self, job_name: &str) -> Option<JobExecutionState> {
        self.executions
            .lock()
            .await
            .get(job_name)
            .map(|execution| execution.state)
    }

    async fn begin(&self, job_name: &str) -> JobExecutionState {
        let state = JobExecutionState::default()
            .transition(JobExecutionEvent::Started)
            .unwrap_or(JobExecutionState::Running);

        self.executions.lock().await.insert(
            job_name.to_owned(),
            JobExecution {
                state,
                interrupt_requested: false,
                forget_on_finish: false,
            },
        );
        state
    }

    async fn finish(&self, job_name: &str, succeeded: bool) -> JobExecutionState {
        let mut executions = self.executions.lock().await;
        let execution = executions.entry(job_name.to_owned()).or_default();
        let event = match (execution.interrupt_requested, succeeded) {
            (true, _) => JobExecutionEvent::Interrupted,
            (false, true) => JobExecutionEvent::Succeeded,
            (false, false) => JobExecutionEvent::Failed,
        };

        match execution.state.transition(event) {
            Ok(next) => execution.state = next,
            Err(error) => {
                warn!(job_name = %job_name, error = %error, "job execution state out of sync");
                execution.state = if succeeded {
                    JobExecutionState::Completed
                } else {
                    JobExecutionState::Failed
                };
            }
        }

        let state = execution.state;
        if execution.forget_on_finish {
            executions.remove(job_name);
        }
        state
    }

    /// Drops the entry for an unscheduled job. A running execution is dropped
    /// once it finishes.
    pub(crate) async fn forget(&self, job_name: &str) {
        let mut executions = self.executions.lock().await;
        match executions.get_mut(job_name) {
            Some(execution) if execution.state == JobExecutionState::Running => {
                execution.forget_on_finish = true;
            }
            Some(_) => {
                executions.remove(job_name);
            }
            None => {}
        }
    }

    async fn request_interrupt(&self, job_name: &str) -> bool {
        let mut executions = self.executions.lock().await;
        match executions.get_mut(job_name) {
            Some(execution) if execution.state == JobExecutionState::Running => {
                execution.interrupt_requested = true;
                true
            }
            _ => false,
        }
    }
}

/// Trigger handler bridging engine firings back into the scheduler.
///
/// Overlapping firings of one job name are serialized by the engine through
/// `ScheduledJob::disallow_concurrent_execution`, not here. Firings are skipped
/// while the runner refuses triggered runs, such as on a cluster standby.
/// Interrupts are cooperative: they are recorded and logged, the downstream
/// run is never killed.
pub struct FlowJobExecutor {
    runner: Arc<dyn JobRunner>,
    tracker: Arc<JobExecutionTracker>,
}

impl FlowJobExecutor {
    /// Creates an executor that runs firings through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn JobRunner>, tracker: Arc<JobExecutionTracker>) -> Self {
        Self { runner, tracker }
    }
}

#[async_trait]
impl TriggerHandler for FlowJobExecutor {
    async fn on_trigger(&self, job_name: &str, payload: TriggerPayload) -> JobExecutionState {
        if !self.runner.accepts_triggered_runs().await {
            info!(job_name = %job_name, "standby node, skipping trigger firing");
            return JobExecutionState::Pending;
        }
        info!(job_name = %job_name, "starting flow job");

        let TriggerPayload {
            mut job_config,
            listener,
            flow_spec,
        } = payload;
        if job_config.flow_spec().is_none()
            && let Some(flow_spec) = flow_spec
        {
            job_config = job_config.with_flow_spec(flow_spec);
        }

        self.tracker.begin(job_name).await;
        let result = self.runner.run_job(&job_config, listener).await;
        let state = self.tracker.finish(job_name, result.is_ok()).await;

        match result {
            Ok(()) => info!(job_name = %job_name, state = state.as_str(), "flow job finished"),
            Err(error) => error!(
                job_name = %job_name,
                state = state.as_str(),
                error = %error,
                cause = %error.cause(),
                "flow job failed"
            ),
        }

        state
    }

    async fn on_interrupt(&self, job_name: &str) {
        info!(job_name = %job_name, "job was interrupted");
        if !self.tracker.request_interrupt(job_name).await {
            debug!(job_name = %job_name, "no running execution to interrupt");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempora_core::AppError;
    use tempora_domain::{
        FlowSpec, FlowSpecInput, JOB_NAME_KEY, JobConfig, JobExecutionState,
    };
    use tokio::sync::{Mutex, Notify};

    use super::{FlowJobExecutor, JobExecutionTracker};
    use crate::flow_scheduler_ports::{
        FlowSchedulerError, JobListener, TriggerHandler, TriggerPayload,
    };
    use crate::immediate_run_dispatcher::JobRunner;

    #[derive(Default)]
    struct RecordingRunner {
        seen_specs: Mutex<Vec<Option<String>>>,
        fail: bool,
        standby: bool,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        async fn run_job(
            &self,
            job_config: &JobConfig,
            _listener: Option<Arc<dyn JobListener>>,
        ) -> Result<(), FlowSchedulerError> {
            self.seen_specs
                .lock()
                .await
                .push(job_config.flow_spec().map(|spec| spec.version().to_owned()));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(FlowSchedulerError::Run {
                    job_name: job_config.job_name().to_owned(),
                    source: AppError::Unavailable("engine offline".to_owned()),
                });
            }
            Ok(())
        }

        async fn accepts_triggered_runs(&self) -> bool {
            !self.standby
        }
    }

    fn payload(flow_spec: Option<FlowSpec>) -> TriggerPayload {
        TriggerPayload {
            job_config: JobConfig::new(BTreeMap::from([(
                JOB_NAME_KEY.to_owned(),
                "flow://A".to_owned(),
            )])),
            listener: None,
            flow_spec,
        }
    }

    fn flow_spec(version: &str) -> FlowSpec {
        FlowSpec::new(FlowSpecInput {
            uri: "flow://A".to_owned(),
            version: version.to_owned(),
            ..FlowSpecInput::default()
        })
        .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn successful_firing_completes_and_attaches_payload_spec() {
        let runner = Arc::new(RecordingRunner::default());
        let tracker = Arc::new(JobExecutionTracker::new());
        let executor = FlowJobExecutor::new(runner.clone(), tracker.clone());

        let state = executor
            .on_trigger("flow://A", payload(Some(flow_spec("3"))))
            .await;

        assert_eq!(state, JobExecutionState::Completed);
        assert_eq!(
            tracker.state_of("flow://A").await,
            Some(JobExecutionState::Completed)
        );
        assert_eq!(*runner.seen_specs.lock().await, vec![Some("3".to_owned())]);
    }

    #[tokio::test]
    async fn failed_run_ends_failed() {
        let runner = Arc::new(RecordingRunner {
            fail: true,
            ..RecordingRunner::default()
        });
        let executor = FlowJobExecutor::new(runner, Arc::new(JobExecutionTracker::new()));

        let state = executor.on_trigger("flow://A", payload(None)).await;

        assert_eq!(state, JobExecutionState::Failed);
    }

    #[tokio::test]
    async fn interrupt_is_cooperative_and_marks_the_execution() {
        let gate = Arc::new(Notify::new());
        let runner = Arc::new(RecordingRunner {
            gate: Some(gate.clone()),
            ..RecordingRunner::default()
        });
        let tracker = Arc::new(JobExecutionTracker::new());
        let executor = Arc::new(FlowJobExecutor::new(runner, tracker.clone()));

        let firing = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.on_trigger("flow://A", payload(None)).await })
        };

        for _ in 0..50 {
            if tracker.state_of("flow://A").await == Some(JobExecutionState::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        executor.on_interrupt("flow://A").await;
        assert_eq!(
            tracker.state_of("flow://A").await,
            Some(JobExecutionState::Running)
        );

        gate.notify_one();
        let state = firing.await.unwrap_or(JobExecutionState::Pending);
        assert_eq!(state, JobExecutionState::Interrupted);
    }

    #[tokio::test]
    async fn interrupt_without_running_execution_is_ignored() {
        let executor = FlowJobExecutor::new(
            Arc::new(RecordingRunner::default()),
            Arc::new(JobExecutionTracker::new()),
        );

        executor.on_interrupt("flow://missing").await;
        let state = executor.on_trigger("flow://A", payload(None)).await;
        assert_eq!(state, JobExecutionState::Completed);
    }

    #[tokio::test]
    async fn standby_runner_skips_the_firing_untracked() {
        let runner = Arc::new(RecordingRunner {
            standby: true,
            ..RecordingRunner::default()
        });
        let tracker = Arc::new(JobExecutionTracker::new());
        let executor = FlowJobExecutor::new(runner.clone(), tracker.clone());

        let state = executor
            .on_trigger("flow://A", payload(Some(flow_spec("3"))))
            .await;

        assert_eq!(state, JobExecutionState::Pending);
        assert!(runner.seen_specs.lock().await.is_empty());
        assert_eq!(tracker.state_of("flow://A").await, None);
    }

    #[tokio::test]
    async fn forget_drops_finished_entries_immediately() {
        let tracker = Arc::new(JobExecutionTracker::new());
        let executor = FlowJobExecutor::new(Arc::new(RecordingRunner::default()), tracker.clone());
        let state = executor.on_trigger("flow://A", payload(None)).await;
        assert_eq!(state, JobExecutionState::Completed);

        tracker.forget("flow://A").await;
        tracker.forget("flow://missing").await;

        assert_eq!(tracker.state_of("flow://A").await, None);
    }

    #[tokio::test]
    async fn forget_waits_for_a_running_execution_to_finish() {
        let gate = Arc::new(Notify::new());
        let runner = Arc::new(RecordingRunner {
            gate: Some(gate.clone()),
            ..RecordingRunner::default()
        });
        let tracker = Arc::new(JobExecutionTracker::new());
        let executor = Arc::new(FlowJobExecutor::new(runner, tracker.clone()));

        let firing = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.on_trigger("flow://A", payload(None)).await })
        };
        for _ in 0..50 {
            if tracker.state_of("flow://A").await == Some(JobExecutionState::Running) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tracker.forget("flow://A").await;
        assert_eq!(
            tracker.state_of("flow://A").await,
            Some(JobExecutionState::Running)
        );

        gate.notify_one();
        let state = firing.await.unwrap_or(JobExecutionState::Pending);
        assert_eq!(state, JobExecutionState::Completed);
        assert_eq!(tracker.state_of("flow://A").await, None);
    }
}
