//! In-memory history source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tasktree_core::{ExecutionRef, HistoryEvent};

use super::{stream_events, EventSource, HistoryStream};
use crate::error::SourceError;

/// Event source backed by histories held in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSource {
    histories: HashMap<ExecutionRef, Vec<HistoryEvent>>,
    fetches: AtomicUsize,
}

impl MemoryEventSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to add the history of one execution run.
    pub fn with_history(mut self, execution: ExecutionRef, events: Vec<HistoryEvent>) -> Self {
        self.insert(execution, events);
        self
    }

    /// Add or replace the history of one execution run.
    pub fn insert(&mut self, execution: ExecutionRef, events: Vec<HistoryEvent>) {
        self.histories.insert(execution, events);
    }

    /// Number of histories fetched so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EventSource for MemoryEventSource {
    async fn fetch_history(&self, execution: &ExecutionRef) -> Result<HistoryStream, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let events = self
            .histories
            .get(execution)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(execution.clone()))?;
        Ok(stream_events(events))
    }
}
