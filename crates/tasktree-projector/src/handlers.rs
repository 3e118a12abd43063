//! Event handlers of the standard registry.
//!
//! Each handler applies one event type to a [`Projection`]. Creating events
//! append a task; lifecycle events resolve the task they refer to and move
//! it forward. Child execution starts are only validated here; the builder
//! performs the recursive projection requested through [`Outcome::ExpandChild`].

use tasktree_core::{
    CoreError, EventKind, EventType, ExecutionRef, GroupStatus, HistoryEvent, Task, TaskStatus,
    TIMER_TASK_NAME,
};

use crate::error::TransformError;
use crate::projection::Projection;
use crate::registry::Outcome;

fn unexpected(event: &HistoryEvent, expected: EventType) -> TransformError {
    TransformError::UnexpectedAttributes {
        event_id: event.event_id,
        expected,
    }
}

fn set_group_status(
    event: &HistoryEvent,
    p: &mut Projection,
    expected: EventType,
    status: GroupStatus,
) -> Result<Outcome, TransformError> {
    if event.event_type() != expected {
        return Err(unexpected(event, expected));
    }
    p.set_group_status(event, status)?;
    Ok(Outcome::Applied)
}

fn update_task(
    event: &HistoryEvent,
    p: &mut Projection,
    expected: EventType,
    status: TaskStatus,
) -> Result<Outcome, TransformError> {
    if event.event_type() != expected {
        return Err(unexpected(event, expected));
    }
    let task_id = event
        .kind
        .referenced_event_id()
        .ok_or_else(|| unexpected(event, expected))?;
    p.advance_task(event, task_id, status)?;
    Ok(Outcome::Applied)
}

pub fn workflow_started(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    set_group_status(event, p, EventType::WorkflowExecutionStarted, GroupStatus::Running)
}

pub fn workflow_completed(
    event: &HistoryEvent,
    p: &mut Projection,
) -> Result<Outcome, TransformError> {
    set_group_status(event, p, EventType::WorkflowExecutionCompleted, GroupStatus::Completed)
}

pub fn workflow_failed(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    set_group_status(event, p, EventType::WorkflowExecutionFailed, GroupStatus::Failed)
}

pub fn activity_scheduled(
    event: &HistoryEvent,
    p: &mut Projection,
) -> Result<Outcome, TransformError> {
    let EventKind::ActivityTaskScheduled { activity_type_name } = &event.kind else {
        return Err(unexpected(event, EventType::ActivityTaskScheduled));
    };
    p.create_task(event, Task::from_type_name(event.event_id, activity_type_name))?;
    Ok(Outcome::Applied)
}

pub fn activity_started(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::ActivityTaskStarted, TaskStatus::Running)
}

pub fn activity_completed(
    event: &HistoryEvent,
    p: &mut Projection,
) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::ActivityTaskCompleted, TaskStatus::Completed)
}

pub fn activity_failed(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::ActivityTaskFailed, TaskStatus::Failed)
}

pub fn activity_timed_out(
    event: &HistoryEvent,
    p: &mut Projection,
) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::ActivityTaskTimedOut, TaskStatus::TimedOut)
}

pub fn child_initiated(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    let EventKind::StartChildWorkflowExecutionInitiated { workflow_type_name } = &event.kind else {
        return Err(unexpected(event, EventType::StartChildWorkflowExecutionInitiated));
    };
    p.create_task(event, Task::from_type_name(event.event_id, workflow_type_name))?;
    Ok(Outcome::Applied)
}

/// Validate a child start and ask the builder to project the child.
///
/// The parent task must exist, must not have sub-tasks yet and must be able
/// to move to running; all of this is checked before the child is fetched.
pub fn child_started(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    let EventKind::ChildWorkflowExecutionStarted {
        initiated_event_id,
        child_execution_id,
        child_run_id,
    } = &event.kind
    else {
        return Err(unexpected(event, EventType::ChildWorkflowExecutionStarted));
    };

    let task = p.task_mut(event, *initiated_event_id)?;
    let invalid = |source: CoreError| TransformError::InvalidTransition {
        event_id: event.event_id,
        source,
    };
    task.status.transition(TaskStatus::Running).map_err(invalid)?;
    if task.sub_tasks.is_some() {
        return Err(invalid(CoreError::InvalidInput(format!(
            "task {} already started a child execution",
            task.id
        ))));
    }

    Ok(Outcome::ExpandChild {
        task_id: *initiated_event_id,
        child: ExecutionRef::new(child_execution_id.clone(), child_run_id.clone()),
    })
}

pub fn child_completed(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::ChildWorkflowExecutionCompleted, TaskStatus::Completed)
}

pub fn child_failed(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::ChildWorkflowExecutionFailed, TaskStatus::Failed)
}

pub fn child_timed_out(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::ChildWorkflowExecutionTimedOut, TaskStatus::TimedOut)
}

/// Timers have no separate start acknowledgment, so the task starts running.
pub fn timer_started(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    if event.event_type() != EventType::TimerStarted {
        return Err(unexpected(event, EventType::TimerStarted));
    }
    p.create_task(event, Task::new(event.event_id, TIMER_TASK_NAME))?;
    p.advance_task(event, event.event_id, TaskStatus::Running)?;
    Ok(Outcome::Applied)
}

pub fn timer_fired(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::TimerFired, TaskStatus::Completed)
}

pub fn timer_canceled(event: &HistoryEvent, p: &mut Projection) -> Result<Outcome, TransformError> {
    update_task(event, p, EventType::TimerCanceled, TaskStatus::Canceled)
}
