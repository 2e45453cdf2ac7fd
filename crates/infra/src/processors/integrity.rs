//! Data integrity verification over the object store's HTTP interface.
//!
//! Reading an object may require the store to stage it first. The store
//! answers `202 Accepted` while it prepares the data and later announces the
//! object on the availability topic; `200 OK` means the content is ready.

use std::time::Duration;

use async_trait::async_trait;
use darceo_core::{ItemProcessor, ProcessError};
use darceo_domain::{DarceoError, Finding, FindingKind, ItemId, ProcessOutcome, Result};
use reqwest::{Response, StatusCode, Url};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use super::{endpoint, parse_base_url};
use crate::http::HttpClient;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Answer of the object store to a read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadRequest {
    /// The content was already staged and is returned in full.
    AlreadyPrepared(Vec<u8>),
    /// Staging started; the object is announced once ready.
    Started { request_id: Option<String> },
}

/// Compares each object's SHA-256 digest with the digest the store recorded.
pub struct HttpIntegrityProcessor {
    client: HttpClient,
    base_url: Url,
}

impl HttpIntegrityProcessor {
    /// Processor for the store at `base_url` with a per-request timeout.
    ///
    /// # Errors
    /// `DarceoError::Config` for an unusable base URL.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder().timeout(request_timeout).build()?;
        Self::with_client(base_url, client)
    }

    /// Processor using a preconfigured client.
    ///
    /// # Errors
    /// `DarceoError::Config` for an unusable base URL.
    pub fn with_client(base_url: &str, client: HttpClient) -> Result<Self> {
        Ok(Self { client, base_url: parse_base_url(base_url)? })
    }

    /// Ask the store for the content of `item`.
    ///
    /// Returns `None` when the store does not know the object.
    ///
    /// # Errors
    /// `ProcessError::Retryable` for transport failures and 5xx answers,
    /// `ProcessError::Fatal` for any other unexpected status.
    pub async fn request_read(
        &self,
        item: &ItemId,
    ) -> std::result::Result<Option<ReadRequest>, ProcessError> {
        let url = endpoint(&self.base_url, &["objects", item.as_str()]).map_err(fatal)?;
        let response = self.client.get(url).await.map_err(transport)?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|err| {
                    ProcessError::Retryable(format!("reading object body failed: {err}"))
                })?;
                Ok(Some(ReadRequest::AlreadyPrepared(body.to_vec())))
            }
            StatusCode::ACCEPTED => {
                let request_id = response
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                Ok(Some(ReadRequest::Started { request_id }))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected_status(&response)),
        }
    }

    async fn recorded_digest(&self, item: &ItemId) -> std::result::Result<String, ProcessError> {
        let url = endpoint(&self.base_url, &["objects", item.as_str(), "digest"]).map_err(fatal)?;
        let response = self.client.get(url).await.map_err(transport)?;
        if response.status() != StatusCode::OK {
            return Err(unexpected_status(&response));
        }

        let text = response
            .text()
            .await
            .map_err(|err| ProcessError::Retryable(format!("reading digest failed: {err}")))?;
        Ok(text.trim().to_ascii_lowercase())
    }
}

#[async_trait]
impl ItemProcessor for HttpIntegrityProcessor {
    #[instrument(skip(self), fields(item_id = %item))]
    async fn process(&self, item: &ItemId) -> std::result::Result<ProcessOutcome, ProcessError> {
        let content = match self.request_read(item).await? {
            None => {
                warn!("object missing from store");
                return Ok(ProcessOutcome::Finding(Finding::new(
                    FindingKind::Missing,
                    format!("object {item} not found in store"),
                )));
            }
            Some(ReadRequest::Started { request_id }) => {
                debug!(request_id = ?request_id, "object staging started");
                return Ok(ProcessOutcome::Unavailable);
            }
            Some(ReadRequest::AlreadyPrepared(content)) => content,
        };

        let actual = hex::encode(Sha256::digest(&content));
        let expected = self.recorded_digest(item).await?;

        if actual == expected {
            debug!(bytes = content.len(), "digest verified");
            return Ok(ProcessOutcome::NoFinding);
        }

        warn!(%expected, %actual, "digest mismatch");
        Ok(ProcessOutcome::Finding(
            Finding::new(FindingKind::Corrupted, format!("object {item} digest mismatch"))
                .with_data(json!({ "expected": expected, "actual": actual })),
        ))
    }
}

fn unexpected_status(response: &Response) -> ProcessError {
    let status = response.status();
    let message = format!("{} answered {status}", response.url());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ProcessError::Retryable(message)
    } else {
        ProcessError::Fatal(message)
    }
}

fn transport(err: DarceoError) -> ProcessError {
    match err {
        DarceoError::Network(message) => ProcessError::Retryable(message),
        other => ProcessError::Fatal(other.to_string()),
    }
}

fn fatal(err: DarceoError) -> ProcessError {
    ProcessError::Fatal(err.to_string())
}
