//! History source reading exported histories from disk.
//!
//! Layout: `<root>/<execution_id>/<run_id>.json`, each file a JSON array of
//! events in recorded order.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use tasktree_core::{ExecutionRef, HistoryEvent};

use super::{stream_events, EventSource, HistoryStream};
use crate::error::SourceError;

/// Event source backed by a directory of exported histories.
#[derive(Debug, Clone)]
pub struct DirectoryEventSource {
    root: PathBuf,
}

impl DirectoryEventSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of this source.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the history file for an execution run.
    ///
    /// Each id must be a single plain path component, so the path always
    /// stays below the root.
    pub fn history_path(&self, execution: &ExecutionRef) -> Result<PathBuf, SourceError> {
        for id in [execution.execution_id.as_str(), execution.run_id.as_str()] {
            if let Some(reason) = unusable_component(id) {
                return Err(SourceError::InvalidId {
                    execution: execution.clone(),
                    reason,
                });
            }
        }
        Ok(self
            .root
            .join(execution.execution_id.as_str())
            .join(format!("{}.json", execution.run_id)))
    }
}

fn unusable_component(id: &str) -> Option<&'static str> {
    if id.is_empty() {
        Some("empty id")
    } else if id == "." || id == ".." {
        Some("relative path component")
    } else if id.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if id.contains('\0') {
        Some("contains a NUL byte")
    } else {
        None
    }
}

#[async_trait]
impl EventSource for DirectoryEventSource {
    async fn fetch_history(&self, execution: &ExecutionRef) -> Result<HistoryStream, SourceError> {
        let path = self.history_path(execution)?;
        debug!(path = %path.display(), execution = %execution, "Reading history file");

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::NotFound(execution.clone()));
            }
            Err(e) => {
                return Err(SourceError::Io {
                    execution: execution.clone(),
                    source: e,
                });
            }
        };

        let events: Vec<HistoryEvent> = serde_json::from_slice(&bytes)?;
        Ok(stream_events(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_reads_history_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryEventSource::new(dir.path());
        let exec = ExecutionRef::new("order_1", "run-a");

        let path = source.history_path(&exec).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"[
                {"event_id": 1, "event_type": "WorkflowExecutionStarted"},
                {"event_id": 2, "event_type": "ActivityTaskScheduled", "activity_type_name": "eats.ChargeOrder"}
            ]"#,
        )
        .unwrap();

        let events: Vec<HistoryEvent> = source
            .fetch_history(&exec)
            .await
            .unwrap()
            .map(|e| e.unwrap())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![
                HistoryEvent::workflow_started(1),
                HistoryEvent::activity_scheduled(2, "eats.ChargeOrder"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryEventSource::new(dir.path());

        let result = source.fetch_history(&ExecutionRef::new("nope", "r")).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_malformed_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryEventSource::new(dir.path());
        let exec = ExecutionRef::new("order_1", "run-a");

        let path = source.history_path(&exec).unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let result = source.fetch_history(&exec).await;
        assert!(matches!(result, Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn test_ids_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("histories");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(dir.path().join("x")).unwrap();
        std::fs::write(dir.path().join("x").join("r.json"), "[]").unwrap();
        let source = DirectoryEventSource::new(&root);

        for exec in [
            ExecutionRef::new("..", "r"),
            ExecutionRef::new("../x", "r"),
            ExecutionRef::new("order_1", "../../x/r"),
            ExecutionRef::new("eats/order_1", "r"),
            ExecutionRef::new(".", "r"),
            ExecutionRef::new("", "r"),
        ] {
            let result = source.fetch_history(&exec).await;
            assert!(
                matches!(result, Err(SourceError::InvalidId { .. })),
                "{exec} was not rejected"
            );
        }
    }

    #[test]
    fn test_plain_ids_map_below_root() {
        let source = DirectoryEventSource::new("/data");
        let path = source
            .history_path(&ExecutionRef::new("order#7?x=1", "run.1"))
            .unwrap();
        assert_eq!(path, PathBuf::from("/data/order#7?x=1/run.1.json"));
    }
}
