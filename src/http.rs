//! Shared HTTP client.
//!
//! Built once per run from [`HttpSettings`] and handed to every producer by
//! reference. Each call returns a [`FetchOutcome`] instead of an error so
//! that callers make the "contributes nothing" decision explicitly.

use crate::config::HttpSettings;
use crate::error::{FetchError, FetchOutcome};
use reqwest::Client;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    concurrency: usize,
}

impl HttpClient {
    /// Build a client with the configured User-Agent, a connect timeout and
    /// a per-read timeout.
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let inner = Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout())
            .read_timeout(settings.read_timeout())
            .build()?;
        Ok(Self {
            inner,
            concurrency: settings.concurrency.max(1),
        })
    }

    /// Worker pool size for per-article fetches.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// GET a page body as text.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get_text(&self, url: &str) -> FetchOutcome<String> {
        self.send(self.inner.get(url)).await
    }

    /// GET with query parameters, returning the body as text.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get_text_with_query<Q: Serialize + ?Sized>(&self, url: &str, query: &Q) -> FetchOutcome<String> {
        self.send(self.inner.get(url).query(query)).await
    }

    /// GET a body as raw bytes (feeds are handed to the XML parser untouched).
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get_bytes(&self, url: &str) -> FetchOutcome<Vec<u8>> {
        let t0 = Instant::now();
        let response = match self.inner.get(url).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };
        if !response.status().is_success() {
            return status_failure(response.status());
        }
        match response.bytes().await {
            Ok(bytes) if bytes.is_empty() => FetchOutcome::Empty,
            Ok(bytes) => {
                debug!(bytes = bytes.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched");
                FetchOutcome::Success(bytes.to_vec())
            }
            Err(e) => transport_failure(e),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> FetchOutcome<String> {
        let t0 = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };
        if !response.status().is_success() {
            return status_failure(response.status());
        }
        match response.text().await {
            Ok(body) if body.trim().is_empty() => FetchOutcome::Empty,
            Ok(body) => {
                debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched");
                FetchOutcome::Success(body)
            }
            Err(e) => transport_failure(e),
        }
    }
}

fn transport_failure<T>(e: reqwest::Error) -> FetchOutcome<T> {
    warn!(error = %e, timeout = e.is_timeout(), "Request failed");
    FetchOutcome::Failed(FetchError::Transport(e))
}

fn status_failure<T>(status: reqwest::StatusCode) -> FetchOutcome<T> {
    warn!(%status, "Non-success HTTP status");
    FetchOutcome::Failed(FetchError::Status(status))
}
