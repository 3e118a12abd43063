//! History sources.
//!
//! An [`EventSource`] hands out the ordered history of one execution run as
//! a lazy stream. Each call starts a fresh fetch; streams are not restartable.

mod directory;
mod http;
mod memory;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use tasktree_core::{ExecutionRef, HistoryEvent};

use crate::error::SourceError;

pub use directory::DirectoryEventSource;
pub use http::{HistoryPage, HttpEventSource};
pub use memory::MemoryEventSource;

/// Ordered stream of history events for one execution run.
pub type HistoryStream = Pin<Box<dyn Stream<Item = Result<HistoryEvent, SourceError>> + Send>>;

/// Supplier of execution histories.
///
/// Implementations must yield events in the order the service recorded them.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Start fetching the history of `execution`.
    async fn fetch_history(&self, execution: &ExecutionRef) -> Result<HistoryStream, SourceError>;
}

/// Wrap an already materialized history in a stream.
pub(crate) fn stream_events(events: Vec<HistoryEvent>) -> HistoryStream {
    Box::pin(tokio_stream::iter(events.into_iter().map(Ok)))
}
