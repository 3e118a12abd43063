//! HTTP history source.
//!
//! Histories are served page by page from
//! `GET {base}/executions/{execution_id}/runs/{run_id}/history`. Each page
//! carries an opaque `next_page_token`; the stream keeps requesting pages
//! until the token is absent.

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use tasktree_core::{ExecutionRef, HistoryEvent};

use super::{EventSource, HistoryStream};
use crate::error::SourceError;

/// One page of an execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Events of this page, in recorded order.
    pub events: Vec<HistoryEvent>,

    /// Token for the following page, absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Event source that reads histories from the orchestration service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    inner: reqwest::Client,
    base_url: String,
    page_size: Option<u32>,
}

impl HttpEventSource {
    /// Create a new HTTP event source.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a new HTTP event source using an existing client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            inner: client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size: None,
        }
    }

    /// Builder method to request a specific page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// URL of the history resource, with each id encoded as one path segment.
    fn history_url(&self, execution: &ExecutionRef) -> Result<Url, SourceError> {
        let invalid = |message: String| SourceError::InvalidBaseUrl {
            base_url: self.base_url.clone(),
            message,
        };

        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend([
                "executions",
                execution.execution_id.as_str(),
                "runs",
                execution.run_id.as_str(),
                "history",
            ]);
        Ok(url)
    }
}

/// Position within a paged history.
struct PageCursor {
    client: reqwest::Client,
    url: Url,
    page_size: Option<u32>,
    execution: ExecutionRef,
    next_token: Option<String>,
}

impl PageCursor {
    async fn fetch(&self, token: Option<&str>) -> Result<HistoryPage, SourceError> {
        debug!(url = %self.url, page_token = ?token, "Fetching history page");

        let mut request = self.client.get(self.url.clone());
        if let Some(token) = token {
            request = request.query(&[("page_token", token)]);
        }
        if let Some(size) = self.page_size {
            request = request.query(&[("page_size", size)]);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(self.execution.clone())),
            status if !status.is_success() => Err(SourceError::UnexpectedResponse {
                execution: self.execution.clone(),
                message: format!("HTTP {}", status),
            }),
            _ => Ok(response.json().await?),
        }
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_history(&self, execution: &ExecutionRef) -> Result<HistoryStream, SourceError> {
        let mut cursor = PageCursor {
            client: self.inner.clone(),
            url: self.history_url(execution)?,
            page_size: self.page_size,
            execution: execution.clone(),
            next_token: None,
        };

        // The first page is fetched eagerly so a missing execution fails here.
        let first = cursor.fetch(None).await?;
        cursor.next_token = first.next_page_token.filter(|t| !t.is_empty());

        let rest = stream::try_unfold(cursor, |mut cursor| async move {
            let Some(token) = cursor.next_token.take() else {
                return Ok::<_, SourceError>(None);
            };
            let page = cursor.fetch(Some(&token)).await?;
            cursor.next_token = page.next_page_token.filter(|t| !t.is_empty());
            Ok::<_, SourceError>(Some((page.events, cursor)))
        });

        let events = stream::once(async move { Ok::<_, SourceError>(first.events) })
            .chain(rest)
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, SourceError>)))
            .try_flatten();

        Ok(Box::pin(events))
    }
}
