//! Per-stream push settings held by the server
//!
//! The server decides how often it pushes frames for a stream and how often
//! it runs detection. The client reads and writes those settings over HTTP
//! and never applies them locally.
//!
//! Failures surface as [`StreamError::Config`]; through
//! [`StreamHandle::fetch_settings`](crate::StreamHandle::fetch_settings) they
//! become one-shot [`ErrorKind::Config`](crate::types::ErrorKind::Config)
//! events instead.

use async_trait::async_trait;
use tracing::debug;

use crate::config::ClientConfig;
use crate::types::{StreamKey, StreamSettings};
use crate::{Result, StreamError};

/// Where a stream's [`StreamSettings`] live.
#[async_trait]
pub trait SettingsEndpoint: Send + Sync {
    async fn fetch(&self, key: &StreamKey) -> Result<StreamSettings>;

    /// Store `settings` and return them as submitted, after normalization.
    async fn update(&self, key: &StreamKey, settings: StreamSettings) -> Result<StreamSettings>;
}

/// JSON settings API at `{api_base}/api/video-streams/{key}/config`.
#[derive(Debug, Clone)]
pub struct HttpSettingsEndpoint {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpSettingsEndpoint {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Use a preconfigured client, e.g. with auth headers or timeouts
    pub fn with_client(config: &ClientConfig, client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config: config.clone() })
    }
}

fn request_failed(key: &StreamKey, action: &str, error: reqwest::Error) -> StreamError {
    StreamError::config_failed(key.as_str(), format!("{action}: {error}"), Some(Box::new(error)))
}

#[async_trait]
impl SettingsEndpoint for HttpSettingsEndpoint {
    async fn fetch(&self, key: &StreamKey) -> Result<StreamSettings> {
        let url = self.config.settings_endpoint(key)?;
        debug!(stream = %key, %url, "Fetching stream settings");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| request_failed(key, "GET failed", e))?;

        let settings: StreamSettings =
            response.json().await.map_err(|e| request_failed(key, "invalid settings body", e))?;
        debug!(stream = %key, ?settings, "Stream settings fetched");
        Ok(settings)
    }

    async fn update(&self, key: &StreamKey, settings: StreamSettings) -> Result<StreamSettings> {
        let url = self.config.settings_endpoint(key)?;
        let settings = settings.normalized();
        debug!(stream = %key, %url, ?settings, "Updating stream settings");

        self.client
            .put(url)
            .json(&settings)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| request_failed(key, "PUT failed", e))?;
        Ok(settings)
    }
}
