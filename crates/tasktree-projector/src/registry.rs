//! Transform registry: which handler runs for which event type.
//!
//! A registry is assembled once through [`RegistryBuilder`] and never
//! mutated afterwards, so a single instance can be shared by any number of
//! concurrent projections behind an `Arc`.

use std::collections::HashMap;
use std::fmt;

use tasktree_core::{EventId, EventType, ExecutionRef, HistoryEvent};

use crate::error::TransformError;
use crate::handlers;
use crate::projection::Projection;

/// What the builder must do after a handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The event was fully applied.
    Applied,
    /// Project `child` and attach its tasks below task `task_id`.
    ExpandChild {
        task_id: EventId,
        child: ExecutionRef,
    },
}

/// Handler applying one event to an in-progress projection.
pub type TransformFn = fn(&HistoryEvent, &mut Projection) -> Result<Outcome, TransformError>;

/// Immutable mapping from event type to handler.
#[derive(Clone)]
pub struct TransformRegistry {
    handlers: HashMap<EventType, TransformFn>,
}

impl TransformRegistry {
    /// Start assembling a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with a handler for every workflow, activity, child execution
    /// and timer event the task tree tracks.
    pub fn standard() -> Self {
        Self::builder()
            .register(EventType::WorkflowExecutionStarted, handlers::workflow_started)
            .register(EventType::WorkflowExecutionCompleted, handlers::workflow_completed)
            .register(EventType::WorkflowExecutionFailed, handlers::workflow_failed)
            .register(EventType::ActivityTaskScheduled, handlers::activity_scheduled)
            .register(EventType::ActivityTaskStarted, handlers::activity_started)
            .register(EventType::ActivityTaskCompleted, handlers::activity_completed)
            .register(EventType::ActivityTaskFailed, handlers::activity_failed)
            .register(EventType::ActivityTaskTimedOut, handlers::activity_timed_out)
            .register(
                EventType::StartChildWorkflowExecutionInitiated,
                handlers::child_initiated,
            )
            .register(EventType::ChildWorkflowExecutionStarted, handlers::child_started)
            .register(EventType::ChildWorkflowExecutionCompleted, handlers::child_completed)
            .register(EventType::ChildWorkflowExecutionFailed, handlers::child_failed)
            .register(EventType::ChildWorkflowExecutionTimedOut, handlers::child_timed_out)
            .register(EventType::TimerStarted, handlers::timer_started)
            .register(EventType::TimerFired, handlers::timer_fired)
            .register(EventType::TimerCanceled, handlers::timer_canceled)
            .build()
    }

    /// Handler registered for `event_type`, if any.
    pub fn get(&self, event_type: EventType) -> Option<TransformFn> {
        self.handlers.get(&event_type).copied()
    }

    /// Check if a handler is registered for `event_type`.
    pub fn is_registered(&self, event_type: EventType) -> bool {
        self.handlers.contains_key(&event_type)
    }

    /// Registered event types, sorted.
    pub fn event_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Assembles a [`TransformRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<EventType, TransformFn>,
}

impl RegistryBuilder {
    /// Register `handler` for `event_type`, replacing any earlier entry.
    pub fn register(mut self, event_type: EventType, handler: TransformFn) -> Self {
        self.handlers.insert(event_type, handler);
        self
    }

    /// Remove the handler for `event_type`, so events of that type are skipped.
    pub fn unregister(mut self, event_type: EventType) -> Self {
        self.handlers.remove(&event_type);
        self
    }

    /// Freeze the registry.
    pub fn build(self) -> TransformRegistry {
        TransformRegistry {
            handlers: self.handlers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_tracked_events() {
        let registry = TransformRegistry::standard();

        assert_eq!(registry.len(), 16);
        assert!(registry.is_registered(EventType::ChildWorkflowExecutionStarted));
        assert!(registry.is_registered(EventType::TimerCanceled));
        assert!(!registry.is_registered(EventType::DecisionTaskCompleted));
        assert!(!registry.is_registered(EventType::MarkerRecorded));
        assert!(registry.get(EventType::Unrecognized).is_none());
    }

    #[test]
    fn test_builder_overrides_and_unregisters() {
        fn ignore(_: &HistoryEvent, _: &mut Projection) -> Result<Outcome, TransformError> {
            Ok(Outcome::Applied)
        }

        let registry = TransformRegistry::builder()
            .register(EventType::MarkerRecorded, ignore)
            .register(EventType::TimerStarted, handlers::timer_started)
            .unregister(EventType::TimerStarted)
            .build();

        assert_eq!(registry.event_types(), vec![EventType::MarkerRecorded]);
    }
}
