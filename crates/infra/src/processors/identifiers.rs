//! Work source listing every object identifier known to the store.

use std::time::Duration;

use async_trait::async_trait;
use darceo_core::WorkSource;
use darceo_domain::{DarceoError, ItemId, Result};
use reqwest::Url;
use tracing::{debug, instrument};

use super::{endpoint, parse_base_url};
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Discovers items through `GET {base}/identifiers`, a JSON array of ids.
pub struct HttpIdentifierSource {
    client: HttpClient,
    base_url: Url,
}

impl HttpIdentifierSource {
    /// # Errors
    /// `DarceoError::Config` for an unusable base URL.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder().timeout(request_timeout).build()?;
        Self::with_client(base_url, client)
    }

    /// # Errors
    /// `DarceoError::Config` for an unusable base URL.
    pub fn with_client(base_url: &str, client: HttpClient) -> Result<Self> {
        Ok(Self { client, base_url: parse_base_url(base_url)? })
    }
}

#[async_trait]
impl WorkSource for HttpIdentifierSource {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn discover(&self) -> Result<Vec<ItemId>> {
        let url = endpoint(&self.base_url, &["identifiers"])?;
        let response = self
            .client
            .get(url)
            .await?
            .error_for_status()
            .map_err(|err| DarceoError::from(InfraError::from(err)))?;

        let ids: Vec<String> =
            response.json().await.map_err(|err| DarceoError::from(InfraError::from(err)))?;
        debug!(count = ids.len(), "identifiers discovered");
        Ok(ids.into_iter().map(ItemId::new).collect())
    }
}
