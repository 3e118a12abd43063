//! In-progress projection of one execution history.
//!
//! Holds the task group being built plus an index from creating-event id to
//! the task's slot in `tasks`. The index lives only as long as one walk and
//! is dropped by [`Projection::finish`].

use std::collections::HashMap;

use tasktree_core::{
    CoreError, EventId, ExecutionRef, GroupStatus, HistoryEvent, Task, TaskGroup, TaskStatus,
};

use crate::error::TransformError;

/// Task group under construction.
#[derive(Debug)]
pub struct Projection {
    group: TaskGroup,
    index: HashMap<EventId, usize>,
}

impl Projection {
    /// Start an empty projection of `execution`.
    pub fn new(execution: ExecutionRef) -> Self {
        Self {
            group: TaskGroup::new(execution),
            index: HashMap::new(),
        }
    }

    /// The task group built so far.
    pub fn group(&self) -> &TaskGroup {
        &self.group
    }

    /// Append a task in arrival order and index it by id.
    pub fn create_task(&mut self, event: &HistoryEvent, task: Task) -> Result<(), TransformError> {
        if self.index.contains_key(&task.id) {
            return Err(TransformError::DuplicateTask {
                event_id: event.event_id,
                task_id: task.id,
            });
        }
        self.index.insert(task.id, self.group.tasks.len());
        self.group.tasks.push(task);
        Ok(())
    }

    /// Resolve the task created by event `task_id`.
    pub fn task_mut(
        &mut self,
        event: &HistoryEvent,
        task_id: EventId,
    ) -> Result<&mut Task, TransformError> {
        let slot = *self.index.get(&task_id).ok_or(TransformError::Lookup {
            event_id: event.event_id,
            referenced_id: task_id,
        })?;
        Ok(&mut self.group.tasks[slot])
    }

    /// Move the task created by event `task_id` forward to `status`.
    pub fn advance_task(
        &mut self,
        event: &HistoryEvent,
        task_id: EventId,
        status: TaskStatus,
    ) -> Result<(), TransformError> {
        self.task_mut(event, task_id)?
            .advance(status)
            .map_err(|source| TransformError::InvalidTransition {
                event_id: event.event_id,
                source,
            })
    }

    /// Move the execution itself to `status`.
    pub fn set_group_status(
        &mut self,
        event: &HistoryEvent,
        status: GroupStatus,
    ) -> Result<(), TransformError> {
        self.group.status = self.group.status.transition(status).map_err(|source| {
            TransformError::InvalidTransition {
                event_id: event.event_id,
                source,
            }
        })?;
        Ok(())
    }

    /// Attach a projected child execution below task `task_id` and mark the
    /// task running.
    pub(crate) fn attach_child(
        &mut self,
        event: &HistoryEvent,
        task_id: EventId,
        child: TaskGroup,
    ) -> Result<(), TransformError> {
        let task = self.task_mut(event, task_id)?;
        let invalid = |source: CoreError| TransformError::InvalidTransition {
            event_id: event.event_id,
            source,
        };
        task.attach_sub_tasks(child.tasks).map_err(invalid)?;
        task.advance(TaskStatus::Running).map_err(invalid)
    }

    /// Finish the walk, dropping the index.
    pub(crate) fn finish(self) -> TaskGroup {
        self.group
    }
}
