//! Scheduler lifecycle states.

use std::fmt;

use serde::Serialize;

/// Where the scheduler is in its one-way lifecycle.
///
/// ```text
/// NotStarted → Running → Terminating → Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    NotStarted,
    Running,
    Terminating,
    Terminated,
}

impl SchedulerState {
    /// Return true if `next` directly follows `self`.
    pub fn can_transition_to(self, next: SchedulerState) -> bool {
        matches!(
            (self, next),
            (SchedulerState::NotStarted, SchedulerState::Running)
                | (SchedulerState::Running, SchedulerState::Terminating)
                | (SchedulerState::Terminating, SchedulerState::Terminated)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::NotStarted => "not_started",
            SchedulerState::Running => "running",
            SchedulerState::Terminating => "terminating",
            SchedulerState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
