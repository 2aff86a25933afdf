use tempora_core::AppError;
use thiserror::Error;

/// Typed failures surfaced by the scheduler's programmatic entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowSchedulerError {
    /// The engine could not install or remove a trigger.
    #[error("failed to schedule job '{job_name}'")]
    Scheduling {
        /// Job name, equal to the flow uri.
        job_name: String,
        /// Underlying cause.
        #[source]
        source: AppError,
    },

    /// The execution engine rejected or failed a run.
    #[error("failed to run flow spec '{job_name}'")]
    Run {
        /// Job name, equal to the flow uri.
        job_name: String,
        /// Underlying cause.
        #[source]
        source: AppError,
    },

    /// A forwarded notice could not be sent to the controller role.
    #[error("failed to forward notice for flow '{flow_uri}' to the controller")]
    Forward {
        /// Flow uri carried by the notice.
        flow_uri: String,
        /// Underlying cause.
        #[source]
        source: AppError,
    },

    /// Best-effort catalog removal failed after local unscheduling.
    #[error("flow '{flow_uri}' was not removed from the catalog cleanly")]
    CatalogCleanup {
        /// Flow uri.
        flow_uri: String,
        /// Underlying cause.
        #[source]
        source: AppError,
    },
}

impl FlowSchedulerError {
    /// Returns the job or flow identifier the failure is tagged with.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Scheduling { job_name, .. } | Self::Run { job_name, .. } => job_name.as_str(),
            Self::Forward { flow_uri, .. } | Self::CatalogCleanup { flow_uri, .. } => {
                flow_uri.as_str()
            }
        }
    }

    /// Returns the underlying cause.
    #[must_use]
    pub fn cause(&self) -> &AppError {
        match self {
            Self::Scheduling { source, .. }
            | Self::Run { source, .. }
            | Self::Forward { source, .. }
            | Self::CatalogCleanup { source, .. } => source,
        }
    }
}
