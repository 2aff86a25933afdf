use tempora_core::{AppError, AppResult};

/// Lifecycle state of one job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobExecutionState {
    /// Created, not started yet.
    #[default]
    Pending,
    /// Handed to the execution engine.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Finished after an interrupt was requested.
    Interrupted,
}

/// Event that moves a job execution between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobExecutionEvent {
    /// The run was handed to the execution engine.
    Started,
    /// The run returned successfully.
    Succeeded,
    /// The run returned an error.
    Failed,
    /// The run returned after an interrupt request.
    Interrupted,
}

impl JobExecutionState {
    /// Returns stable label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }

    /// Returns true for completed, failed and interrupted states.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Interrupted)
    }

    /// Applies one event and returns the next state.
    pub fn transition(self, event: JobExecutionEvent) -> AppResult<Self> {
        match (self, event) {
            (Self::Pending, JobExecutionEvent::Started) => Ok(Self::Running),
            (Self::Running, JobExecutionEvent::Succeeded) => Ok(Self::Completed),
            (Self::Running, JobExecutionEvent::Failed) => Ok(Self::Failed),
            (Self::Running, JobExecutionEvent::Interrupted) => Ok(Self::Interrupted),
            (state, event) => Err(AppError::Conflict(format!(
                "job execution cannot apply {event:?} while {}",
                state.as_str()
            ))),
        }
    }
}
