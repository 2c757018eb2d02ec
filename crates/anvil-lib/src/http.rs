//! Thin HTTP GET capability used by the resolver, downloader, and mirror.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;

use crate::cancel::CancelToken;
use crate::error::UpdaterError;

const USER_AGENT: &str = concat!("anvil-launcher/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared client for a whole run. Timeouts apply per attempt, not per task.
pub fn default_client() -> Result<Client, UpdaterError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Some(Duration::from_secs(30)))
        .build()
        .map_err(|e| UpdaterError::Network {
            url: "(client setup)".to_string(),
            source: e,
        })
}

pub struct HttpRequest<'a> {
    client: &'a Client,
    url: String,
    cancel: CancelToken,
}

impl<'a> HttpRequest<'a> {
    pub fn get(client: &'a Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            cancel: CancelToken::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn expect_status(self, status: u16) -> PendingRequest<'a> {
        PendingRequest {
            request: self,
            expected: status,
        }
    }
}

pub struct PendingRequest<'a> {
    request: HttpRequest<'a>,
    expected: u16,
}

impl PendingRequest<'_> {
    async fn send(&self) -> Result<reqwest::Response, UpdaterError> {
        if self.request.cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }
        let response = self
            .request
            .client
            .get(&self.request.url)
            .send()
            .await
            .map_err(|e| UpdaterError::Network {
                url: self.request.url.clone(),
                source: e,
            })?;
        let status = response.status().as_u16();
        if status != self.expected {
            return Err(UpdaterError::HttpStatus {
                url: self.request.url.clone(),
                status,
            });
        }
        Ok(response)
    }

    /// Whole body as bytes, aborting mid-transfer on cancellation.
    pub async fn bytes(self) -> Result<Vec<u8>, UpdaterError> {
        let response = self.send().await?;
        let mut body = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if self.request.cancel.is_cancelled() {
                return Err(UpdaterError::Cancelled);
            }
            let chunk = chunk.map_err(|e| UpdaterError::Network {
                url: self.request.url.clone(),
                source: e,
            })?;
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Body decoded as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, UpdaterError> {
        let url = self.request.url.clone();
        let body = self.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| UpdaterError::Decode {
            context: url,
            message: e.to_string(),
        })
    }

    /// Stream the body into `path`, returning the SHA-1 of what was written
    /// so callers can verify without a second read. The parent directory
    /// must already exist.
    pub async fn save_to(self, path: &Path) -> Result<String, UpdaterError> {
        let response = self.send().await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut hasher = Sha1::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if self.request.cancel.is_cancelled() {
                return Err(UpdaterError::Cancelled);
            }
            let chunk = chunk.map_err(|e| UpdaterError::Network {
                url: self.request.url.clone(),
                source: e,
            })?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(format!("{:x}", hasher.finalize()))
    }
}
