//! Task and TaskGroup types.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{EventId, ExecutionId, ExecutionRef, RunId};
use crate::status::{GroupStatus, TaskStatus};

/// Fixed display name of the synthetic task created for a timer.
pub const TIMER_TASK_NAME: &str = "timer.WaitForDeadline";

/// One schedulable unit of work (activity, child execution or timer) in the
/// projected tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Id of the event that created this task.
    pub id: EventId,

    /// Human-readable label.
    pub name: String,

    /// Current task status.
    pub status: TaskStatus,

    /// Tasks of the child execution this task started, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_tasks: Option<Vec<Task>>,
}

impl Task {
    /// Create a new scheduled Task.
    pub fn new(id: EventId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: TaskStatus::Scheduled,
            sub_tasks: None,
        }
    }

    /// Create a Task whose label is derived from a scheduled type name.
    pub fn from_type_name(id: EventId, type_name: &str) -> Self {
        Self::new(id, display_name(type_name))
    }

    /// Builder method to set the status (useful for testing).
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to set sub-tasks (useful for testing).
    pub fn with_sub_tasks(mut self, sub_tasks: Vec<Task>) -> Self {
        self.sub_tasks = Some(sub_tasks);
        self
    }

    /// Move the task forward to `next`.
    pub fn advance(&mut self, next: TaskStatus) -> Result<(), CoreError> {
        self.status = self.status.transition(next)?;
        Ok(())
    }

    /// Attach the tasks of the child execution. Allowed once per task.
    pub fn attach_sub_tasks(&mut self, sub_tasks: Vec<Task>) -> Result<(), CoreError> {
        if self.sub_tasks.is_some() {
            return Err(CoreError::InvalidInput(format!(
                "task {} already has sub-tasks",
                self.id
            )));
        }
        self.sub_tasks = Some(sub_tasks);
        Ok(())
    }

    /// Sub-tasks as a slice; empty for tasks without a child execution.
    pub fn sub_tasks(&self) -> &[Task] {
        self.sub_tasks.as_deref().unwrap_or_default()
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Derive a display label from a fully qualified type name.
///
/// Only the segment after the last `/` is considered. Within it, keeps the
/// part after the last `.` (`eats.ChargeOrder` becomes `ChargeOrder`);
/// a segment without a usable suffix is returned whole.
pub fn display_name(type_name: &str) -> &str {
    let base = match type_name.rsplit_once('/') {
        Some((_, base)) if !base.is_empty() => base,
        _ => type_name,
    };
    match base.rsplit_once('.') {
        Some((_, suffix)) if !suffix.is_empty() => suffix,
        _ => base,
    }
}

/// Root of one execution's projected task tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    /// Execution whose history was projected.
    pub execution_id: ExecutionId,

    /// Run whose history was projected.
    pub run_id: RunId,

    /// Top-level tasks in the order their creating events appeared.
    pub tasks: Vec<Task>,

    /// Overall execution status.
    pub status: GroupStatus,
}

impl TaskGroup {
    /// Create an empty TaskGroup for an execution.
    pub fn new(execution: ExecutionRef) -> Self {
        Self {
            execution_id: execution.execution_id,
            run_id: execution.run_id,
            tasks: Vec::new(),
            status: GroupStatus::default(),
        }
    }

    /// Reference to the projected execution.
    pub fn execution(&self) -> ExecutionRef {
        ExecutionRef::new(self.execution_id.clone(), self.run_id.clone())
    }

    /// Get a top-level task by id.
    pub fn task(&self, id: EventId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Iterate over every task in the tree, depth first, with its nesting depth.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.tasks.iter().rev().map(|t| (0, t)).collect(),
        }
    }

    /// Total number of tasks, including nested sub-tasks.
    pub fn total_tasks(&self) -> usize {
        self.walk().count()
    }

    /// Check if every task in the tree is terminal.
    pub fn is_settled(&self) -> bool {
        self.walk().all(|(_, t)| t.is_terminal())
    }
}

/// Depth-first iterator returned by [`TaskGroup::walk`].
pub struct Walk<'a> {
    stack: Vec<(usize, &'a Task)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a Task);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, task) = self.stack.pop()?;
        self.stack
            .extend(task.sub_tasks().iter().rev().map(|t| (depth + 1, t)));
        Some((depth, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("eats.ChargeOrder"), "ChargeOrder");
        assert_eq!(display_name("github.com/x/courier.DispatchCourier"), "DispatchCourier");
        assert_eq!(display_name("Pay"), "Pay");
        assert_eq!(display_name("trailing."), "trailing.");
        assert_eq!(display_name("github.com/acme/eats"), "eats");
        assert_eq!(display_name("github.com/acme/eats.Order"), "Order");
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut task = Task::new(EventId::new(2), "Pay");
        assert_eq!(task.status, TaskStatus::Scheduled);

        task.advance(TaskStatus::Running).unwrap();
        task.advance(TaskStatus::Completed).unwrap();
        assert!(task.is_terminal());

        assert!(task.advance(TaskStatus::Running).is_err());
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_sub_tasks_attached_once() {
        let mut task = Task::new(EventId::new(3), "Deliver");
        assert!(task.sub_tasks().is_empty());

        task.attach_sub_tasks(vec![Task::new(EventId::new(1), "Dispatch")])
            .unwrap();
        assert_eq!(task.sub_tasks().len(), 1);
        assert!(task.attach_sub_tasks(Vec::new()).is_err());
    }

    #[test]
    fn test_walk_is_depth_first() {
        let mut group = TaskGroup::new(ExecutionRef::new("order", "r1"));
        group.tasks = vec![
            Task::new(EventId::new(2), "Charge").with_status(TaskStatus::Completed),
            Task::new(EventId::new(5), "Deliver").with_sub_tasks(vec![
                Task::new(EventId::new(1), "Dispatch"),
                Task::new(EventId::new(4), "Pickup"),
            ]),
            Task::new(EventId::new(9), TIMER_TASK_NAME),
        ];

        let visited: Vec<(usize, i64)> = group.walk().map(|(d, t)| (d, t.id.get())).collect();
        assert_eq!(visited, vec![(0, 2), (0, 5), (1, 1), (1, 4), (0, 9)]);
        assert_eq!(group.total_tasks(), 5);
        assert!(!group.is_settled());
        assert_eq!(group.task(EventId::new(5)).map(|t| t.name.as_str()), Some("Deliver"));
    }

    #[test]
    fn test_serialize_omits_missing_sub_tasks() {
        let task = Task::new(EventId::new(2), "Pay");
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value, serde_json::json!({"id": 2, "name": "Pay", "status": "scheduled"}));
    }
}
