//! Task tree projection.
//!
//! Turns the event history of a workflow execution into a tree of tasks:
//! one task per scheduled activity, started child execution or timer, with
//! child executions expanded recursively into sub-tasks.
//!
//! The moving parts:
//! - [`EventSource`] fetches the ordered history of one execution run
//! - [`TransformRegistry`] maps each event type to the handler that applies it
//! - [`TaskTreeBuilder`] drains a history, dispatches every event and
//!   recurses into child executions

pub mod builder;
pub mod config;
pub mod error;
pub mod handlers;
pub mod projection;
pub mod registry;
pub mod source;

pub use builder::TaskTreeBuilder;
pub use config::ProjectorConfig;
pub use error::{SourceError, TransformError};
pub use projection::Projection;
pub use registry::{Outcome, RegistryBuilder, TransformFn, TransformRegistry};
pub use source::{
    DirectoryEventSource, EventSource, HistoryPage, HistoryStream, HttpEventSource,
    MemoryEventSource,
};
