//! HTTP registration channel.
//!
//! `POST {http_url}{register_path}` with a JSON body:
//!
//! ```json
//! {"name": "poneglyph-worker-node1-3f9a0c1b2d4e", "capacity": 2, "cpuUsage": 0.12, "memoryUsage": 0.40}
//! ```
//!
//! The coordinator answers with `{"workerId": "...", "pollIntervalMs": 1000}`
//! and may add `"ok": false` plus a `"message"` to decline.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChannelKind, ChannelReply, RegistrationChannel, RegistrationRequest};
use crate::config::CoordinatorConfig;
use crate::error::{Result, WorkerError};

/// Longest response body quoted back in a rejection.
const MAX_ERROR_BODY: usize = 256;

/// Registration payload sent to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRegisterRequest {
    pub name: String,
    pub capacity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
}

impl From<&RegistrationRequest> for HttpRegisterRequest {
    fn from(request: &RegistrationRequest) -> Self {
        Self {
            name: request.name.clone(),
            capacity: request.capacity,
            cpu_usage: request.usage.map(|u| u.cpu),
            memory_usage: request.usage.map(|u| u.memory),
        }
    }
}

/// Registration reply from the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpRegisterResponse {
    /// Absent means accepted; the HTTP status already said so.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(alias = "worker_id", alias = "id")]
    pub worker_id: String,
    #[serde(alias = "poll_interval_ms", alias = "poll_ms")]
    pub poll_interval_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<HttpRegisterResponse> for ChannelReply {
    fn from(response: HttpRegisterResponse) -> Self {
        Self {
            ok: response.ok.unwrap_or(true),
            worker_id: response.worker_id,
            poll_interval_ms: response.poll_interval_ms,
            message: response.message,
        }
    }
}

/// Registers through the coordinator's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    url: String,
}

impl HttpChannel {
    /// Create a channel posting to `url`.
    pub fn new(url: impl Into<String>, connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| WorkerError::config_with_source("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Build from configuration.
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        Self::new(
            config.register_url(),
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RegistrationChannel for HttpChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Http
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<ChannelReply> {
        let payload = HttpRegisterRequest::from(request);
        debug!(url = %self.url, name = %payload.name, "Sending registration request");

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                WorkerError::call_failed_with_source(
                    ChannelKind::Http,
                    format!("request to {} failed", self.url),
                    e,
                )
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            WorkerError::call_failed_with_source(
                ChannelKind::Http,
                "failed to read response body",
                e,
            )
        })?;

        if !status.is_success() {
            return Err(WorkerError::rejected(
                ChannelKind::Http,
                format!("status {}: {}", status, truncate(body.trim(), MAX_ERROR_BODY)),
            ));
        }

        let parsed: HttpRegisterResponse = serde_json::from_str(&body).map_err(|e| {
            WorkerError::rejected(ChannelKind::Http, format!("malformed response body: {}", e))
        })?;

        Ok(parsed.into())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
