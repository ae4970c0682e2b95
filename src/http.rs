//! HTTP client for the pattern server.
//!
//! Implements both fetch collaborators against the server's JSON API:
//! the catalog listing and the batch preview generator.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;

use crate::fetch::{FetchError, PatternCatalog, PreviewSource};
use crate::preview::{PatternMetadata, PreviewRecord};

const LIST_ENDPOINT: &str = "list_theta_rho_files_with_metadata";
const PREVIEW_ENDPOINT: &str = "preview_thr_batch";

#[derive(Serialize)]
struct PreviewBatchRequest<'a> {
    file_names: &'a [String],
}

/// Talks to a pattern server at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpPreviewClient {
    client: Client,
    base_url: String,
}

impl HttpPreviewClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

fn network_error(e: reqwest::Error) -> FetchError {
    if e.is_decode() {
        FetchError::Decode(e.to_string())
    } else {
        FetchError::Network(e.to_string())
    }
}

#[async_trait]
impl PatternCatalog for HttpPreviewClient {
    async fn list_patterns(&self) -> Result<Vec<PatternMetadata>, FetchError> {
        let response = self
            .client
            .get(self.url(LIST_ENDPOINT))
            .send()
            .await
            .map_err(network_error)?;
        let patterns: Vec<PatternMetadata> = check_status(response)?
            .json()
            .await
            .map_err(network_error)?;
        debug!(count = patterns.len(), "Listed patterns");
        Ok(patterns)
    }
}

#[async_trait]
impl PreviewSource for HttpPreviewClient {
    async fn fetch_batch(
        &self,
        pattern_ids: &[String],
    ) -> Result<HashMap<String, PreviewRecord>, FetchError> {
        let response = self
            .client
            .post(self.url(PREVIEW_ENDPOINT))
            .json(&PreviewBatchRequest {
                file_names: pattern_ids,
            })
            .send()
            .await
            .map_err(network_error)?;
        let previews: HashMap<String, PreviewRecord> = check_status(response)?
            .json()
            .await
            .map_err(network_error)?;
        debug!(requested = pattern_ids.len(), returned = previews.len(), "Fetched preview batch");
        Ok(previews)
    }
}
