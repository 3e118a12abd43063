//! Status enums for Tasks and TaskGroups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status of a single Task in the projected tree.
///
/// Tasks move `Scheduled -> Running -> {Completed, Failed, TimedOut, Canceled}`.
/// `Running` may be skipped; nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Work has been scheduled but not picked up.
    #[default]
    Scheduled,
    /// Work is in progress.
    Running,
    /// Work finished successfully.
    Completed,
    /// Work finished with an error.
    Failed,
    /// Work exceeded its deadline.
    TimedOut,
    /// Work was canceled before it finished.
    Canceled,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Canceled
        )
    }

    /// Returns true if the task is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    fn rank(self) -> u8 {
        match self {
            Self::Scheduled => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Canceled => 2,
        }
    }

    /// Returns true if moving to `next` keeps the task moving forward.
    ///
    /// Re-entering the current non-terminal state is accepted as a no-op.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self == next || next.rank() > self.rank()
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: TaskStatus) -> Result<TaskStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Compact code used by display templates.
    pub fn short_code(&self) -> &'static str {
        match self {
            Self::Scheduled => "s",
            Self::Running => "r",
            Self::Completed => "c",
            Self::Failed => "f",
            Self::TimedOut => "t",
            Self::Canceled => "ca",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timedOut",
            Self::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Overall status of a projected execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupStatus {
    /// Execution started (or is assumed started) and has not closed.
    #[default]
    Running,
    /// Execution completed successfully.
    Completed,
    /// Execution failed.
    Failed,
}

impl GroupStatus {
    /// Returns true if the execution has closed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Validate a transition, returning the new status.
    pub fn transition(self, next: GroupStatus) -> Result<GroupStatus, CoreError> {
        if !self.is_terminal() && (self == next || next.is_terminal()) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Compact code used by display templates.
    pub fn short_code(&self) -> &'static str {
        match self {
            Self::Running => "r",
            Self::Completed => "c",
            Self::Failed => "f",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
