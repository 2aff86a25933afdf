mod catalog;
mod cluster;
mod engine;
mod errors;
mod lease;
mod orchestrator;

pub use catalog::{FlowCatalog, SpecCatalogListener};
pub use cluster::{ClusterCoordinator, ControllerInbox};
pub use engine::{ScheduledJob, SchedulingEngine, TriggerHandler, TriggerPayload};
pub use errors::FlowSchedulerError;
pub use lease::{LeadershipLease, LeadershipLeaseCoordinator};
pub use orchestrator::{FlowOrchestrator, FlowRunOutcome, JobListener};
