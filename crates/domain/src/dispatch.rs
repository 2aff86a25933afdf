/// Inputs the dispatch policy looks at for one spec event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchInput {
    /// Whether this node currently holds leadership.
    pub is_active: bool,
    /// Whether a cluster coordination channel is configured.
    pub cluster_present: bool,
    /// Whether the job carries a cron schedule.
    pub has_schedule: bool,
    /// Whether an immediate run was requested.
    pub run_immediately: bool,
}

/// Outcome of the dispatch policy for one added flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchDecision {
    /// Send the event to the controller role and act on nothing locally.
    Forward,
    /// Install a recurring trigger only.
    InstallRecurring,
    /// Submit one immediate run only.
    RunOnce,
    /// Install a recurring trigger and submit one immediate run.
    InstallAndRunOnce,
}

impl DispatchDecision {
    /// Returns true when a recurring trigger must be installed.
    #[must_use]
    pub fn installs_trigger(&self) -> bool {
        matches!(self, Self::InstallRecurring | Self::InstallAndRunOnce)
    }

    /// Returns true when an immediate run must be submitted.
    #[must_use]
    pub fn runs_once(&self) -> bool {
        matches!(self, Self::RunOnce | Self::InstallAndRunOnce)
    }

    /// Returns stable label used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::InstallRecurring => "install_recurring",
            Self::RunOnce => "run_once",
            Self::InstallAndRunOnce => "install_and_run_once",
        }
    }
}

/// Returns true when a standby node must forward instead of acting locally.
/// Without a cluster channel the node runs in single-node mode and always acts.
#[must_use]
pub fn should_forward(is_active: bool, cluster_present: bool) -> bool {
    !is_active && cluster_present
}

/// Decides how one added flow is dispatched.
///
/// Forwarding wins whenever the node is standby with a cluster channel. Otherwise
/// the schedule decides recurring versus once, and `run_immediately` only adds a
/// one-off run next to a recurring install.
#[must_use]
pub fn decide_dispatch(input: DispatchInput) -> DispatchDecision {
    if should_forward(input.is_active, input.cluster_present) {
        return DispatchDecision::Forward;
    }

    match (input.has_schedule, input.run_immediately) {
        (true, true) => DispatchDecision::InstallAndRunOnce,
        (true, false) => DispatchDecision::InstallRecurring,
        (false, _) => DispatchDecision::RunOnce,
    }
}
