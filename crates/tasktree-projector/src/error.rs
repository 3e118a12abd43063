//! Error types for history sources and projection.

use thiserror::Error;

use tasktree_core::{CoreError, EventId, EventType, ExecutionRef};

/// Errors raised while fetching an execution history.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source has no history for the execution.
    #[error("history not found: {0}")]
    NotFound(ExecutionRef),

    /// Reading a stored history failed.
    #[error("I/O error reading history for {execution}: {source}")]
    Io {
        execution: ExecutionRef,
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The source answered with something other than a history page.
    #[error("unexpected response for {execution}: {message}")]
    UnexpectedResponse {
        execution: ExecutionRef,
        message: String,
    },

    /// The execution or run id cannot address a stored history.
    #[error("invalid history id {execution}: {reason}")]
    InvalidId {
        execution: ExecutionRef,
        reason: &'static str,
    },

    /// The configured service URL cannot carry a history path.
    #[error("invalid base URL '{base_url}': {message}")]
    InvalidBaseUrl { base_url: String, message: String },

    /// History payload could not be decoded.
    #[error("failed to decode history: {0}")]
    Decode(#[from] serde_json::Error),

    /// Draining the history took longer than the configured timeout.
    #[error("timed out fetching history for {0}")]
    Timeout(ExecutionRef),

    /// The caller cancelled the projection.
    #[error("history fetch cancelled")]
    Cancelled,
}

/// Errors that abort a projection.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The history (or a child's history) could not be fetched.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A lifecycle event points at an event that never created a task.
    #[error("event {event_id} references unknown event {referenced_id}")]
    Lookup {
        event_id: EventId,
        referenced_id: EventId,
    },

    /// Two creating events carry the same id.
    #[error("event {event_id} creates task {task_id}, which already exists")]
    DuplicateTask { event_id: EventId, task_id: EventId },

    /// A lifecycle event would move a task or the execution backward.
    #[error("event {event_id}: {source}")]
    InvalidTransition {
        event_id: EventId,
        #[source]
        source: CoreError,
    },

    /// A handler was registered for a type whose payload it cannot read.
    #[error("event {event_id} is not a {expected} event")]
    UnexpectedAttributes {
        event_id: EventId,
        expected: EventType,
    },

    /// Child executions are nested deeper than allowed.
    #[error("child execution {execution} exceeds nesting limit of {limit}")]
    DepthExceeded {
        execution: ExecutionRef,
        limit: usize,
    },

    /// A child execution is one of its own ancestors.
    #[error("execution {0} appears among its own ancestors")]
    CycleDetected(ExecutionRef),
}

impl TransformError {
    /// Returns true for failures to fetch a history.
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns true for unresolved event references.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup { .. })
    }
}
