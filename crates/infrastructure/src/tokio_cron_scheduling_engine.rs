//! In-process cron engine driven by tokio timers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempora_application::{ScheduledJob, SchedulingEngine, TriggerHandler};
use tempora_core::{AppError, AppResult};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct InstalledJob {
    trigger_loop: JoinHandle<()>,
    handler: Arc<dyn TriggerHandler>,
}

type FiringGate = Arc<Mutex<()>>;

/// Scheduling engine that runs one trigger loop task per installed job.
///
/// Firings execute on their own task and hold a permit from the engine's
/// firing pool, so removing or replacing a job stops future firings without
/// cancelling the one in flight. Jobs that disallow concurrent execution also
/// hold a gate keyed by job name, which survives reinstalls of that name.
pub struct TokioCronSchedulingEngine {
    jobs: Mutex<HashMap<String, InstalledJob>>,
    firing_gates: Mutex<HashMap<String, FiringGate>>,
    firing_permits: Arc<Semaphore>,
}

impl TokioCronSchedulingEngine {
    /// Creates an engine whose firings share `worker_count` permits.
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            firing_gates: Mutex::new(HashMap::new()),
            firing_permits: Arc::new(Semaphore::new(worker_count.max(1))),
        }
    }

    /// Lists installed job names in sorted order.
    pub async fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.jobs.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stops every trigger loop. In-flight firings run to completion.
    pub async fn shutdown(&self) {
        let mut jobs = self.jobs.lock().await;
        for (job_name, job) in jobs.drain() {
            job.trigger_loop.abort();
            debug!(job_name = %job_name, "trigger loop stopped on shutdown");
        }
        drop(jobs);

        self.firing_gates
            .lock()
            .await
            .retain(|_, gate| Arc::strong_count(gate) > 1);
    }

    async fn firing_gate(&self, job_name: &str) -> FiringGate {
        self.firing_gates
            .lock()
            .await
            .entry(job_name.to_owned())
            .or_default()
            .clone()
    }

    /// Drops the gate for `job_name` unless a firing still holds it.
    async fn release_firing_gate(&self, job_name: &str) {
        let mut gates = self.firing_gates.lock().await;
        if gates
            .get(job_name)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(job_name);
        }
    }
}

#[async_trait]
impl SchedulingEngine for TokioCronSchedulingEngine {
    async fn install(&self, job: ScheduledJob, handler: Arc<dyn TriggerHandler>) -> AppResult<()> {
        if job.job_name.trim().is_empty() {
            return Err(AppError::Validation(
                "scheduled job name must not be empty".to_owned(),
            ));
        }

        let job_name = job.job_name.clone();
        let expression = job.schedule.expression().to_owned();
        let gate = self.firing_gate(job_name.as_str()).await;
        let trigger_loop = tokio::spawn(run_trigger_loop(
            job,
            handler.clone(),
            gate,
            self.firing_permits.clone(),
        ));

        let replaced = self.jobs.lock().await.insert(
            job_name.clone(),
            InstalledJob {
                trigger_loop,
                handler,
            },
        );
        if let Some(previous) = replaced {
            previous.trigger_loop.abort();
            debug!(job_name = %job_name, "replaced existing trigger");
        }

        info!(job_name = %job_name, schedule = %expression, "trigger installed");
        Ok(())
    }

    async fn remove(&self, job_name: &str) -> AppResult<bool> {
        let Some(job) = self.jobs.lock().await.remove(job_name) else {
            return Ok(false);
        };

        job.trigger_loop.abort();
        self.release_firing_gate(job_name).await;
        info!(job_name = %job_name, "trigger removed");
        Ok(true)
    }

    async fn interrupt(&self, job_name: &str) -> AppResult<bool> {
        let handler = self
            .jobs
            .lock()
            .await
            .get(job_name)
            .map(|job| job.handler.clone());

        match handler {
            Some(handler) => {
                handler.on_interrupt(job_name).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

async fn run_trigger_loop(
    job: ScheduledJob,
    handler: Arc<dyn TriggerHandler>,
    gate: FiringGate,
    firing_permits: Arc<Semaphore>,
) {
    loop {
        let now = Utc::now();
        let Some(next_fire) = job.schedule.next_after(now) else {
            info!(job_name = %job.job_name, "schedule has no further fire times");
            return;
        };

        let delay = (next_fire - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(delay).await;

        let firing = tokio::spawn(fire_once(
            job.clone(),
            handler.clone(),
            gate.clone(),
            firing_permits.clone(),
        ));

        if job.disallow_concurrent_execution
            && let Err(error) = firing.await
        {
            warn!(job_name = %job.job_name, error = %error, "trigger firing task failed");
        }
    }
}

async fn fire_once(
    job: ScheduledJob,
    handler: Arc<dyn TriggerHandler>,
    gate: FiringGate,
    firing_permits: Arc<Semaphore>,
) {
    let ScheduledJob {
        job_name,
        payload,
        disallow_concurrent_execution,
        ..
    } = job;
    // Taken before the pool permit so a waiting firing does not hold a worker.
    let _turn = if disallow_concurrent_execution {
        Some(gate.lock_owned().await)
    } else {
        None
    };
    let Ok(_permit) = firing_permits.acquire_owned().await else {
        warn!(job_name = %job_name, "firing pool closed, skipping trigger");
        return;
    };

    debug!(job_name = %job_name, "trigger fired");
    let state = handler.on_trigger(job_name.as_str(), payload).await;
    debug!(job_name = %job_name, state = state.as_str(), "trigger firing finished");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempora_application::{ScheduledJob, SchedulingEngine, TriggerHandler, TriggerPayload};
    use tempora_domain::{CronSchedule, JobConfig, JobExecutionState};
    use tokio::sync::{Mutex, Notify, mpsc};

    use super::TokioCronSchedulingEngine;

    struct RecordingHandler {
        fired: mpsc::UnboundedSender<String>,
        finished: mpsc::UnboundedSender<String>,
        hold: Duration,
        running: AtomicUsize,
        max_running: AtomicUsize,
        interrupts: Mutex<Vec<String>>,
        started: Notify,
    }

    impl RecordingHandler {
        fn new(
            hold: Duration,
        ) -> (
            Arc<Self>,
            mpsc::UnboundedReceiver<String>,
            mpsc::UnboundedReceiver<String>,
        ) {
            let (fired, fired_receiver) = mpsc::unbounded_channel();
            let (finished, finished_receiver) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    fired,
                    finished,
                    hold,
                    running: AtomicUsize::new(0),
                    max_running: AtomicUsize::new(0),
                    interrupts: Mutex::new(Vec::new()),
                    started: Notify::new(),
                }),
                fired_receiver,
                finished_receiver,
            )
        }
    }

    #[async_trait]
    impl TriggerHandler for RecordingHandler {
        async fn on_trigger(&self, job_name: &str, _payload: TriggerPayload) -> JobExecutionState {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            let _ = self.fired.send(job_name.to_owned());
            self.started.notify_one();

            tokio::time::sleep(self.hold).await;

            self.running.fetch_sub(1, Ordering::SeqCst);
            let _ = self.finished.send(job_name.to_owned());
            JobExecutionState::Completed
        }

        async fn on_interrupt(&self, job_name: &str) {
            self.interrupts.lock().await.push(job_name.to_owned());
        }
    }

    fn every_second(job_name: &str, disallow_concurrent_execution: bool) -> ScheduledJob {
        ScheduledJob {
            job_name: job_name.to_owned(),
            schedule: CronSchedule::parse("* * * * * *").unwrap_or_else(|_| unreachable!()),
            payload: TriggerPayload {
                job_config: JobConfig::new(BTreeMap::new()),
                listener: None,
                flow_spec: None,
            },
            disallow_concurrent_execution,
        }
    }

    #[tokio::test]
    async fn installed_trigger_fires_on_schedule() {
        let engine = TokioCronSchedulingEngine::new(2);
        let (handler, mut fired, _finished) = RecordingHandler::new(Duration::ZERO);

        let result = engine
            .install(every_second("flow://A", true), handler.clone())
            .await;
        assert!(result.is_ok());

        let job_name = tokio::time::timeout(Duration::from_secs(3), fired.recv())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(job_name.as_deref(), Some("flow://A"));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn install_replaces_job_with_the_same_name() {
        let engine = TokioCronSchedulingEngine::new(2);
        let (handler, _fired, _finished) = RecordingHandler::new(Duration::ZERO);

        for _ in 0..2 {
            let result = engine
                .install(every_second("flow://A", true), handler.clone())
                .await;
            assert!(result.is_ok());
        }

        assert_eq!(engine.job_names().await, vec!["flow://A".to_owned()]);
        engine.shutdown().await;
        assert!(engine.job_names().await.is_empty());
    }

    #[tokio::test]
    async fn remove_reports_whether_the_job_existed() {
        let engine = TokioCronSchedulingEngine::new(2);
        let (handler, _fired, _finished) = RecordingHandler::new(Duration::ZERO);
        let result = engine
            .install(every_second("flow://A", true), handler)
            .await;
        assert!(result.is_ok());

        assert_eq!(engine.remove("flow://A").await, Ok(true));
        assert_eq!(engine.remove("flow://A").await, Ok(false));
    }

    #[tokio::test]
    async fn remove_lets_the_in_flight_firing_finish() {
        let engine = TokioCronSchedulingEngine::new(2);
        let (handler, _fired, mut finished) = RecordingHandler::new(Duration::from_millis(400));
        let result = engine
            .install(every_second("flow://A", true), handler.clone())
            .await;
        assert!(result.is_ok());

        tokio::time::timeout(Duration::from_secs(3), handler.started.notified())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(engine.remove("flow://A").await, Ok(true));

        let done = tokio::time::timeout(Duration::from_secs(2), finished.recv())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(done.as_deref(), Some("flow://A"));
    }

    #[tokio::test]
    async fn disallowed_concurrency_never_overlaps_firings() {
        let engine = TokioCronSchedulingEngine::new(4);
        let (handler, _fired, mut finished) = RecordingHandler::new(Duration::from_millis(1500));
        let result = engine
            .install(every_second("flow://slow", true), handler.clone())
            .await;
        assert!(result.is_ok());

        for _ in 0..2 {
            let done = tokio::time::timeout(Duration::from_secs(5), finished.recv())
                .await
                .unwrap_or_else(|_| unreachable!());
            assert!(done.is_some());
        }

        assert_eq!(handler.max_running.load(Ordering::SeqCst), 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn replacing_a_job_waits_for_its_in_flight_firing() {
        let engine = TokioCronSchedulingEngine::new(4);
        let (handler, _fired, mut finished) = RecordingHandler::new(Duration::from_millis(2500));
        let result = engine
            .install(every_second("flow://A", true), handler.clone())
            .await;
        assert!(result.is_ok());

        tokio::time::timeout(Duration::from_secs(3), handler.started.notified())
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(engine.remove("flow://A").await, Ok(true));
        let result = engine
            .install(every_second("flow://A", true), handler.clone())
            .await;
        assert!(result.is_ok());

        for _ in 0..2 {
            let done = tokio::time::timeout(Duration::from_secs(8), finished.recv())
                .await
                .unwrap_or_else(|_| unreachable!());
            assert_eq!(done.as_deref(), Some("flow://A"));
        }

        assert_eq!(handler.max_running.load(Ordering::SeqCst), 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn interrupt_is_relayed_only_for_installed_jobs() {
        let engine = TokioCronSchedulingEngine::new(1);
        let (handler, _fired, _finished) = RecordingHandler::new(Duration::ZERO);
        let result = engine
            .install(every_second("flow://A", true), handler.clone())
            .await;
        assert!(result.is_ok());

        assert_eq!(engine.interrupt("flow://A").await, Ok(true));
        assert_eq!(engine.interrupt("flow://missing").await, Ok(false));
        assert_eq!(
            handler.interrupts.lock().await.clone(),
            vec!["flow://A".to_owned()]
        );
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn install_rejects_blank_job_names() {
        let engine = TokioCronSchedulingEngine::new(1);
        let (handler, _fired, _finished) = RecordingHandler::new(Duration::ZERO);

        let result = engine.install(every_second("  ", true), handler).await;
        assert!(result.is_err());
    }
}
