//! HTTP fetching
//!
//! [`Fetch`] is the seam between the pipeline and the network. The pipeline
//! only ever talks to the trait, so tests and embedders can substitute a
//! stub without touching the worker or enumeration code.

use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

/// Outcome of a successful fetch exchange.
///
/// A 404 response is a payload, not an error: absent documents are a normal
/// part of sparse id ranges and are permanently skipped rather than retried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchPayload {
    /// 2xx response body
    Body(Vec<u8>),
    /// The server answered 404 for this URL
    NotFound,
}

/// Abstraction over document retrieval.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch one URL to completion.
    ///
    /// Returns `Err` for transport failures and non-2xx statuses other
    /// than 404.
    async fn fetch(&self, url: &str) -> Result<FetchPayload>;
}

/// [`Fetch`] implementation backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from the harvest configuration.
    pub fn new(config: &HarvestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {e}"),
                key: None,
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchPayload> {
        let response = self.client.get(url).send().await.map_err(|e| Error::Network {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            trace!(url, "document absent (404)");
            return Ok(FetchPayload::NotFound);
        }
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| Error::Network {
            url: url.to_string(),
            source: e,
        })?;
        trace!(url, bytes = body.len(), "document fetched");
        Ok(FetchPayload::Body(body.to_vec()))
    }
}
