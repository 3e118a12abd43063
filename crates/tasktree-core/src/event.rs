//! Execution history events as served by the orchestration service.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{EventId, ExecutionId, ExecutionRef, RunId};

/// One entry of an execution's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Position of this event within its history.
    pub event_id: EventId,
    /// When the service recorded the event, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Type tag and type-specific attributes.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl HistoryEvent {
    /// Create a new history event.
    pub fn new(event_id: impl Into<EventId>, kind: EventKind) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp: None,
            kind,
        }
    }

    /// Builder method to set the recorded timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The type tag of this event.
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Create a WorkflowExecutionStarted event.
    pub fn workflow_started(event_id: i64) -> Self {
        Self::new(event_id, EventKind::WorkflowExecutionStarted)
    }

    /// Create a WorkflowExecutionCompleted event.
    pub fn workflow_completed(event_id: i64) -> Self {
        Self::new(event_id, EventKind::WorkflowExecutionCompleted)
    }

    /// Create a WorkflowExecutionFailed event.
    pub fn workflow_failed(event_id: i64, reason: Option<String>) -> Self {
        Self::new(event_id, EventKind::WorkflowExecutionFailed { reason })
    }

    /// Create an ActivityTaskScheduled event.
    pub fn activity_scheduled(event_id: i64, activity_type_name: impl Into<String>) -> Self {
        Self::new(
            event_id,
            EventKind::ActivityTaskScheduled {
                activity_type_name: activity_type_name.into(),
            },
        )
    }

    /// Create an ActivityTaskStarted event.
    pub fn activity_started(event_id: i64, scheduled_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::ActivityTaskStarted {
                scheduled_event_id: scheduled_event_id.into(),
            },
        )
    }

    /// Create an ActivityTaskCompleted event.
    pub fn activity_completed(event_id: i64, scheduled_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::ActivityTaskCompleted {
                scheduled_event_id: scheduled_event_id.into(),
            },
        )
    }

    /// Create an ActivityTaskFailed event.
    pub fn activity_failed(event_id: i64, scheduled_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::ActivityTaskFailed {
                scheduled_event_id: scheduled_event_id.into(),
            },
        )
    }

    /// Create an ActivityTaskTimedOut event.
    pub fn activity_timed_out(event_id: i64, scheduled_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::ActivityTaskTimedOut {
                scheduled_event_id: scheduled_event_id.into(),
            },
        )
    }

    /// Create a StartChildWorkflowExecutionInitiated event.
    pub fn child_initiated(event_id: i64, workflow_type_name: impl Into<String>) -> Self {
        Self::new(
            event_id,
            EventKind::StartChildWorkflowExecutionInitiated {
                workflow_type_name: workflow_type_name.into(),
            },
        )
    }

    /// Create a ChildWorkflowExecutionStarted event.
    pub fn child_started(event_id: i64, initiated_event_id: i64, child: ExecutionRef) -> Self {
        Self::new(
            event_id,
            EventKind::ChildWorkflowExecutionStarted {
                initiated_event_id: initiated_event_id.into(),
                child_execution_id: child.execution_id,
                child_run_id: child.run_id,
            },
        )
    }

    /// Create a ChildWorkflowExecutionCompleted event.
    pub fn child_completed(event_id: i64, initiated_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::ChildWorkflowExecutionCompleted {
                initiated_event_id: initiated_event_id.into(),
            },
        )
    }

    /// Create a ChildWorkflowExecutionFailed event.
    pub fn child_failed(event_id: i64, initiated_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::ChildWorkflowExecutionFailed {
                initiated_event_id: initiated_event_id.into(),
            },
        )
    }

    /// Create a ChildWorkflowExecutionTimedOut event.
    pub fn child_timed_out(event_id: i64, initiated_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::ChildWorkflowExecutionTimedOut {
                initiated_event_id: initiated_event_id.into(),
            },
        )
    }

    /// Create a TimerStarted event.
    pub fn timer_started(event_id: i64) -> Self {
        Self::new(event_id, EventKind::TimerStarted { timer_id: None })
    }

    /// Create a TimerFired event.
    pub fn timer_fired(event_id: i64, started_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::TimerFired {
                started_event_id: started_event_id.into(),
            },
        )
    }

    /// Create a TimerCanceled event.
    pub fn timer_canceled(event_id: i64, started_event_id: i64) -> Self {
        Self::new(
            event_id,
            EventKind::TimerCanceled {
                started_event_id: started_event_id.into(),
            },
        )
    }
}

/// Type-specific payload of a history event, tagged by `event_type`.
///
/// Tags this crate has no model for decode as [`EventKind::Unrecognized`]
/// instead of failing, so newer service versions stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventKind {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    WorkflowExecutionSignaled {
        signal_name: String,
    },

    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,

    ActivityTaskScheduled {
        activity_type_name: String,
    },
    ActivityTaskStarted {
        scheduled_event_id: EventId,
    },
    ActivityTaskCompleted {
        scheduled_event_id: EventId,
    },
    ActivityTaskFailed {
        scheduled_event_id: EventId,
    },
    ActivityTaskTimedOut {
        scheduled_event_id: EventId,
    },

    StartChildWorkflowExecutionInitiated {
        workflow_type_name: String,
    },
    ChildWorkflowExecutionStarted {
        initiated_event_id: EventId,
        child_execution_id: ExecutionId,
        child_run_id: RunId,
    },
    ChildWorkflowExecutionCompleted {
        initiated_event_id: EventId,
    },
    ChildWorkflowExecutionFailed {
        initiated_event_id: EventId,
    },
    ChildWorkflowExecutionTimedOut {
        initiated_event_id: EventId,
    },

    TimerStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timer_id: Option<String>,
    },
    TimerFired {
        started_event_id: EventId,
    },
    TimerCanceled {
        started_event_id: EventId,
    },

    MarkerRecorded {
        marker_name: String,
    },

    #[serde(other)]
    Unrecognized,
}

impl EventKind {
    /// The fieldless type tag for this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::WorkflowExecutionStarted => EventType::WorkflowExecutionStarted,
            Self::WorkflowExecutionCompleted => EventType::WorkflowExecutionCompleted,
            Self::WorkflowExecutionFailed { .. } => EventType::WorkflowExecutionFailed,
            Self::WorkflowExecutionSignaled { .. } => EventType::WorkflowExecutionSignaled,
            Self::DecisionTaskScheduled => EventType::DecisionTaskScheduled,
            Self::DecisionTaskStarted => EventType::DecisionTaskStarted,
            Self::DecisionTaskCompleted => EventType::DecisionTaskCompleted,
            Self::ActivityTaskScheduled { .. } => EventType::ActivityTaskScheduled,
            Self::ActivityTaskStarted { .. } => EventType::ActivityTaskStarted,
            Self::ActivityTaskCompleted { .. } => EventType::ActivityTaskCompleted,
            Self::ActivityTaskFailed { .. } => EventType::ActivityTaskFailed,
            Self::ActivityTaskTimedOut { .. } => EventType::ActivityTaskTimedOut,
            Self::StartChildWorkflowExecutionInitiated { .. } => {
                EventType::StartChildWorkflowExecutionInitiated
            }
            Self::ChildWorkflowExecutionStarted { .. } => EventType::ChildWorkflowExecutionStarted,
            Self::ChildWorkflowExecutionCompleted { .. } => {
                EventType::ChildWorkflowExecutionCompleted
            }
            Self::ChildWorkflowExecutionFailed { .. } => EventType::ChildWorkflowExecutionFailed,
            Self::ChildWorkflowExecutionTimedOut { .. } => {
                EventType::ChildWorkflowExecutionTimedOut
            }
            Self::TimerStarted { .. } => EventType::TimerStarted,
            Self::TimerFired { .. } => EventType::TimerFired,
            Self::TimerCanceled { .. } => EventType::TimerCanceled,
            Self::MarkerRecorded { .. } => EventType::MarkerRecorded,
            Self::Unrecognized => EventType::Unrecognized,
        }
    }

    /// Id of the scheduling event a lifecycle event refers back to.
    ///
    /// Returns `None` for events that do not reference another event.
    pub fn referenced_event_id(&self) -> Option<EventId> {
        match self {
            Self::ActivityTaskStarted { scheduled_event_id }
            | Self::ActivityTaskCompleted { scheduled_event_id }
            | Self::ActivityTaskFailed { scheduled_event_id }
            | Self::ActivityTaskTimedOut { scheduled_event_id } => Some(*scheduled_event_id),
            Self::ChildWorkflowExecutionStarted {
                initiated_event_id, ..
            }
            | Self::ChildWorkflowExecutionCompleted { initiated_event_id }
            | Self::ChildWorkflowExecutionFailed { initiated_event_id }
            | Self::ChildWorkflowExecutionTimedOut { initiated_event_id } => {
                Some(*initiated_event_id)
            }
            Self::TimerFired { started_event_id } | Self::TimerCanceled { started_event_id } => {
                Some(*started_event_id)
            }
            _ => None,
        }
    }
}

/// Type tag of a history event, used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    WorkflowExecutionStarted,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    WorkflowExecutionSignaled,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    ActivityTaskScheduled,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    StartChildWorkflowExecutionInitiated,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionTimedOut,
    TimerStarted,
    TimerFired,
    TimerCanceled,
    MarkerRecorded,
    Unrecognized,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
