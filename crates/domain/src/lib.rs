//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod controller_message;
mod dispatch;
mod execution;
mod job_config;
mod schedule;
mod spec;

pub use controller_message::{ControllerMessage, ControllerMessageType, TargetRole};
pub use dispatch::{DispatchDecision, DispatchInput, decide_dispatch, should_forward};
pub use execution::{JobExecutionEvent, JobExecutionState};
pub use job_config::{FLOW_RUN_IMMEDIATELY_KEY, JOB_NAME_KEY, JOB_SCHEDULE_KEY, JobConfig};
pub use schedule::CronSchedule;
pub use spec::{FlowSpec, FlowSpecInput, Spec, SpecKind, TopologySpec};
