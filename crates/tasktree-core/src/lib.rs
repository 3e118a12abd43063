//! Task Tree Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime specifics
//! - Storage
//!
//! It models execution history events as served by the orchestration
//! service and the task tree they are projected into.

pub mod error;
pub mod event;
pub mod ids;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use error::CoreError;
pub use event::{EventKind, EventType, HistoryEvent};
pub use ids::{EventId, ExecutionId, ExecutionRef, RunId};
pub use status::{GroupStatus, TaskStatus};
pub use task::{display_name, Task, TaskGroup, Walk, TIMER_TASK_NAME};
