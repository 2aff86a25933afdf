//! Application services and ports.

#![forbid(unsafe_code)]

mod flow_job_executor;
mod flow_scheduler_ports;
mod flow_scheduler_service;
mod immediate_run_dispatcher;

pub use flow_job_executor::{FlowJobExecutor, JobExecutionTracker};
pub use flow_scheduler_ports::{
    ClusterCoordinator, ControllerInbox, FlowCatalog, FlowOrchestrator, FlowRunOutcome,
    FlowSchedulerError, JobListener, LeadershipLease, LeadershipLeaseCoordinator, ScheduledJob,
    SchedulingEngine, SpecCatalogListener, TriggerHandler, TriggerPayload,
};
pub use flow_scheduler_service::FlowSchedulerService;
pub use immediate_run_dispatcher::{ImmediateRunDispatcher, JobRunner};
