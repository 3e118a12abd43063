//! Task tree builder: drives one projection from fetch to finished tree.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use tasktree_core::{ExecutionId, ExecutionRef, HistoryEvent, RunId, TaskGroup};

use crate::config::ProjectorConfig;
use crate::error::{SourceError, TransformError};
use crate::projection::Projection;
use crate::registry::{Outcome, TransformRegistry};
use crate::source::EventSource;

/// Projects execution histories into task trees.
///
/// A builder holds no per-projection state and may serve any number of
/// concurrent `transform` calls.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tasktree_projector::{DirectoryEventSource, TaskTreeBuilder, TransformRegistry};
///
/// async fn run() -> Result<(), Box<dyn std::error::Error>> {
///     let builder = TaskTreeBuilder::new(
///         Arc::new(DirectoryEventSource::new("histories")),
///         Arc::new(TransformRegistry::standard()),
///     );
///
///     let group = builder.transform("order_42", "run-1").await?;
///     println!("{} tasks, status {}", group.tasks.len(), group.status);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct TaskTreeBuilder {
    source: Arc<dyn EventSource>,
    registry: Arc<TransformRegistry>,
    config: ProjectorConfig,
}

impl TaskTreeBuilder {
    /// Create a builder with the default configuration.
    pub fn new(source: Arc<dyn EventSource>, registry: Arc<TransformRegistry>) -> Self {
        Self {
            source,
            registry,
            config: ProjectorConfig::default(),
        }
    }

    /// Builder method to set the configuration.
    pub fn with_config(mut self, config: ProjectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Registry used for dispatch.
    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    /// Project the history of one execution run into a task tree.
    pub async fn transform(
        &self,
        execution_id: impl Into<ExecutionId>,
        run_id: impl Into<RunId>,
    ) -> Result<TaskGroup, TransformError> {
        let execution = ExecutionRef::new(execution_id, run_id);
        self.transform_execution(&execution).await
    }

    /// Project the history of `execution` into a task tree.
    pub async fn transform_execution(
        &self,
        execution: &ExecutionRef,
    ) -> Result<TaskGroup, TransformError> {
        let mut ancestors = Vec::new();
        match self.project(execution.clone(), &mut ancestors).await {
            Ok(group) => {
                info!(
                    execution = %execution,
                    tasks = group.tasks.len(),
                    total_tasks = group.total_tasks(),
                    status = %group.status,
                    "Projected task tree"
                );
                Ok(group)
            }
            Err(e) => {
                warn!(execution = %execution, error = %e, "Projection aborted");
                Err(e)
            }
        }
    }

    /// Like [`transform_execution`](Self::transform_execution), but gives up
    /// with [`SourceError::Cancelled`] as soon as `cancel` fires.
    pub async fn transform_with_cancel(
        &self,
        execution: &ExecutionRef,
        cancel: &CancellationToken,
    ) -> Result<TaskGroup, TransformError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(execution = %execution, "Projection cancelled");
                Err(SourceError::Cancelled.into())
            }
            result = self.transform_execution(execution) => result,
        }
    }

    fn project<'a>(
        &'a self,
        execution: ExecutionRef,
        ancestors: &'a mut Vec<ExecutionRef>,
    ) -> BoxFuture<'a, Result<TaskGroup, TransformError>> {
        async move {
            let depth = ancestors.len();
            if depth > self.config.max_depth {
                return Err(TransformError::DepthExceeded {
                    execution,
                    limit: self.config.max_depth,
                });
            }
            if self.config.detect_cycles && ancestors.contains(&execution) {
                return Err(TransformError::CycleDetected(execution));
            }

            let events = self.fetch(&execution).await?;
            debug!(execution = %execution, depth, events = events.len(), "Fetched history");

            let mut projection = Projection::new(execution.clone());
            ancestors.push(execution);
            let applied = self.apply_all(&events, &mut projection, ancestors).await;
            ancestors.pop();
            applied?;

            Ok(projection.finish())
        }
        .boxed()
    }

    async fn apply_all(
        &self,
        events: &[HistoryEvent],
        projection: &mut Projection,
        ancestors: &mut Vec<ExecutionRef>,
    ) -> Result<(), TransformError> {
        for event in events {
            let event_type = event.event_type();
            let Some(handler) = self.registry.get(event_type) else {
                trace!(event_id = %event.event_id, event_type = %event_type, "Skipping unregistered event");
                continue;
            };

            debug!(event_id = %event.event_id, event_type = %event_type, "Applying event");
            match handler(event, projection)? {
                Outcome::Applied => {}
                Outcome::ExpandChild { task_id, child } => {
                    debug!(task_id = %task_id, child = %child, "Expanding child execution");
                    let child_group = self.project(child, ancestors).await?;
                    projection.attach_child(event, task_id, child_group)?;
                }
            }
        }
        Ok(())
    }

    async fn fetch(&self, execution: &ExecutionRef) -> Result<Vec<HistoryEvent>, SourceError> {
        let drain = async {
            let mut stream = self.source.fetch_history(execution).await?;
            let mut events = Vec::new();
            while let Some(event) = stream.next().await {
                events.push(event?);
            }
            Ok::<_, SourceError>(events)
        };

        match self.config.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, drain)
                .await
                .map_err(|_| SourceError::Timeout(execution.clone()))?,
            None => drain.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tasktree_core::{EventId, GroupStatus, Task, TaskStatus, TIMER_TASK_NAME};

    use crate::source::{HistoryStream, MemoryEventSource};

    fn builder(source: MemoryEventSource) -> TaskTreeBuilder {
        TaskTreeBuilder::new(Arc::new(source), Arc::new(TransformRegistry::standard()))
    }

    fn order() -> ExecutionRef {
        ExecutionRef::new("order_1", "r1")
    }

    #[tokio::test]
    async fn test_activity_completes() {
        let source = MemoryEventSource::new().with_history(
            order(),
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::activity_scheduled(2, "Pay"),
                HistoryEvent::activity_started(3, 2),
                HistoryEvent::activity_completed(4, 2),
                HistoryEvent::workflow_completed(5),
            ],
        );

        let group = builder(source).transform("order_1", "r1").await.unwrap();

        assert_eq!(group.status, GroupStatus::Completed);
        assert_eq!(
            group.tasks,
            vec![Task::new(EventId::new(2), "Pay").with_status(TaskStatus::Completed)]
        );
    }

    #[tokio::test]
    async fn test_timer_fires_while_running() {
        let source = MemoryEventSource::new().with_history(
            order(),
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::timer_started(5),
                HistoryEvent::timer_fired(6, 5),
            ],
        );

        let group = builder(source).transform_execution(&order()).await.unwrap();

        assert_eq!(group.status, GroupStatus::Running);
        assert_eq!(
            group.tasks,
            vec![Task::new(EventId::new(5), TIMER_TASK_NAME).with_status(TaskStatus::Completed)]
        );
    }

    #[tokio::test]
    async fn test_child_execution_is_expanded() {
        let courier = ExecutionRef::new("courier_1", "r2");
        let source = MemoryEventSource::new()
            .with_history(
                order(),
                vec![
                    HistoryEvent::workflow_started(1),
                    HistoryEvent::child_initiated(3, "Deliver"),
                    HistoryEvent::child_started(4, 3, courier.clone()),
                ],
            )
            .with_history(
                courier,
                vec![
                    HistoryEvent::workflow_started(1),
                    HistoryEvent::activity_scheduled(2, "Dispatch"),
                    HistoryEvent::activity_completed(3, 2),
                ],
            );

        let group = builder(source).transform_execution(&order()).await.unwrap();

        let parent = group.task(EventId::new(3)).unwrap();
        assert_eq!(parent.status, TaskStatus::Running);
        assert_eq!(
            parent.sub_tasks(),
            &[Task::new(EventId::new(2), "Dispatch").with_status(TaskStatus::Completed)]
        );
    }

    #[tokio::test]
    async fn test_tasks_follow_arrival_order_not_id_order() {
        let source = MemoryEventSource::new().with_history(
            order(),
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::activity_scheduled(5, "Pay"),
                HistoryEvent::activity_scheduled(3, "Cook"),
                HistoryEvent::activity_completed(6, 3),
            ],
        );

        let group = builder(source).transform_execution(&order()).await.unwrap();

        let ids: Vec<i64> = group.tasks.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![5, 3]);
        assert_eq!(group.tasks[1].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_child_activities_become_sub_tasks_in_order() {
        let kitchen = ExecutionRef::new("kitchen_1", "r3");
        let source = MemoryEventSource::new()
            .with_history(
                order(),
                vec![
                    HistoryEvent::workflow_started(1),
                    HistoryEvent::child_initiated(2, "restaurant.Prepare"),
                    HistoryEvent::child_started(3, 2, kitchen.clone()),
                ],
            )
            .with_history(
                kitchen,
                vec![
                    HistoryEvent::workflow_started(1),
                    HistoryEvent::activity_scheduled(9, "Accept"),
                    HistoryEvent::activity_scheduled(4, "Cook"),
                    HistoryEvent::activity_scheduled(7, "Pack"),
                ],
            );

        let group = builder(source).transform_execution(&order()).await.unwrap();

        let parent = group.task(EventId::new(2)).unwrap();
        let sub_tasks: Vec<(i64, &str)> = parent
            .sub_tasks()
            .iter()
            .map(|t| (t.id.get(), t.name.as_str()))
            .collect();
        assert_eq!(sub_tasks, vec![(9, "Accept"), (4, "Cook"), (7, "Pack")]);
    }

    #[tokio::test]
    async fn test_child_close_updates_parent_only() {
        let courier = ExecutionRef::new("courier_1", "r2");
        let source = MemoryEventSource::new()
            .with_history(
                order(),
                vec![
                    HistoryEvent::workflow_started(1),
                    HistoryEvent::child_initiated(3, "Deliver"),
                    HistoryEvent::child_started(4, 3, courier.clone()),
                    HistoryEvent::child_failed(5, 3),
                    HistoryEvent::workflow_failed(6, None),
                ],
            )
            .with_history(
                courier,
                vec![
                    HistoryEvent::workflow_started(1),
                    HistoryEvent::activity_scheduled(2, "Dispatch"),
                ],
            );
        let source = Arc::new(source);
        let builder = TaskTreeBuilder::new(source.clone(), Arc::new(TransformRegistry::standard()));

        let group = builder.transform_execution(&order()).await.unwrap();

        assert_eq!(group.status, GroupStatus::Failed);
        let parent = &group.tasks[0];
        assert_eq!(parent.status, TaskStatus::Failed);
        assert_eq!(parent.sub_tasks()[0].status, TaskStatus::Scheduled);
        // The child is walked once, when it starts.
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_reference_is_lookup_error() {
        let source = MemoryEventSource::new().with_history(
            order(),
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::activity_started(2, 99),
            ],
        );

        let err = builder(source).transform_execution(&order()).await.unwrap_err();
        assert!(err.is_lookup());
    }

    #[tokio::test]
    async fn test_missing_child_history_aborts_parent() {
        let source = MemoryEventSource::new().with_history(
            order(),
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::child_initiated(3, "Deliver"),
                HistoryEvent::child_started(4, 3, ExecutionRef::new("courier_9", "r9")),
            ],
        );

        let err = builder(source).transform_execution(&order()).await.unwrap_err();
        assert!(matches!(
            err,
            TransformError::Source(SourceError::NotFound(ref exec)) if exec.execution_id.as_str() == "courier_9"
        ));
    }

    #[tokio::test]
    async fn test_unregistered_events_are_skipped() {
        let source = MemoryEventSource::new().with_history(
            order(),
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::new(EventId::new(2), tasktree_core::EventKind::DecisionTaskScheduled),
                HistoryEvent::new(EventId::new(3), tasktree_core::EventKind::Unrecognized),
                HistoryEvent::activity_scheduled(4, "Pay"),
            ],
        );

        let group = builder(source).transform_execution(&order()).await.unwrap();
        assert_eq!(group.tasks.len(), 1);
        assert_eq!(group.tasks[0].id, EventId::new(4));
    }

    #[tokio::test]
    async fn test_self_referencing_child_is_cycle() {
        let source = MemoryEventSource::new().with_history(
            order(),
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::child_initiated(2, "Loop"),
                HistoryEvent::child_started(3, 2, order()),
            ],
        );

        let err = builder(source).transform_execution(&order()).await.unwrap_err();
        assert!(matches!(err, TransformError::CycleDetected(_)));
    }

    #[tokio::test]
    async fn test_nesting_limit() {
        let a = ExecutionRef::new("a", "r");
        let b = ExecutionRef::new("b", "r");
        let c = ExecutionRef::new("c", "r");
        let nest = |child: &ExecutionRef| {
            vec![
                HistoryEvent::child_initiated(1, "Nested"),
                HistoryEvent::child_started(2, 1, child.clone()),
            ]
        };
        let source = MemoryEventSource::new()
            .with_history(a.clone(), nest(&b))
            .with_history(b, nest(&c))
            .with_history(c, vec![HistoryEvent::workflow_started(1)]);
        let source = Arc::new(source);
        let registry = Arc::new(TransformRegistry::standard());

        let shallow = TaskTreeBuilder::new(source.clone(), registry.clone())
            .with_config(ProjectorConfig::default().with_max_depth(1));
        let err = shallow.transform_execution(&a).await.unwrap_err();
        assert!(matches!(err, TransformError::DepthExceeded { limit: 1, .. }));

        let deep = TaskTreeBuilder::new(source, registry)
            .with_config(ProjectorConfig::default().with_max_depth(2));
        let group = deep.transform_execution(&a).await.unwrap();
        assert_eq!(group.total_tasks(), 2);
    }

    struct StalledSource;

    #[async_trait]
    impl EventSource for StalledSource {
        async fn fetch_history(&self, _: &ExecutionRef) -> Result<HistoryStream, SourceError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(crate::source::stream_events(Vec::new()))
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let builder = TaskTreeBuilder::new(Arc::new(StalledSource), Arc::new(TransformRegistry::standard()))
            .with_config(ProjectorConfig::default().with_fetch_timeout(Some(Duration::from_millis(20))));

        let err = builder.transform_execution(&order()).await.unwrap_err();
        assert!(matches!(err, TransformError::Source(SourceError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cancellation() {
        let builder = TaskTreeBuilder::new(Arc::new(StalledSource), Arc::new(TransformRegistry::standard()))
            .with_config(ProjectorConfig::default().with_fetch_timeout(None));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = builder.transform_with_cancel(&order(), &cancel).await.unwrap_err();
        assert!(matches!(err, TransformError::Source(SourceError::Cancelled)));
    }
}
