// rust/worker-core/src/config.rs

//! Configuration management for the worker.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, WorkerError};
use crate::identity::{DEFAULT_CAPACITY, DEFAULT_NAME_PREFIX};

// Top-level worker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub identity: IdentityConfig,
    pub coordinator: CoordinatorConfig,
    pub retry: RegistrationRetryConfig,
}

/// How the worker names itself and what it offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Prefix of the generated worker name.
    pub name_prefix: String,
    /// Concurrent task slots offered to the coordinator.
    pub capacity: u32,
}

/// Where and how to reach the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// gRPC address (`host:port` or a full `http://` URI). Leaving it unset
    /// disables the gRPC channel and registration goes straight to HTTP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grpc_address: Option<String>,
    /// Base URL of the coordinator's HTTP API.
    pub http_url: String,
    /// Path of the registration endpoint, appended to `http_url`.
    pub register_path: String,
    /// Connection timeout in milliseconds, per channel.
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds, per channel.
    pub request_timeout_ms: u64,
    /// Upper bound for one channel attempt, connect included.
    pub attempt_timeout_ms: u64,
    /// Poll interval used when the coordinator does not suggest one.
    pub default_poll_interval_ms: u64,
}

/// Backoff between whole registration rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationRetryConfig {
    /// Retries after the first round. 0 disables retrying.
    pub max_retries: u32,
    /// Initial delay (milliseconds) between rounds.
    pub initial_delay_ms: u64,
    /// Maximum delay (milliseconds) between rounds.
    pub max_delay_ms: u64,
    /// Factor applied to the delay after each round.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grpc_address: None,
            http_url: "http://localhost:8080".to_string(),
            register_path: "/api/workers/register".to_string(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 5_000,
            attempt_timeout_ms: 5_000,
            default_poll_interval_ms: 1_000,
        }
    }
}

impl Default for RegistrationRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl CoordinatorConfig {
    /// Full URL of the HTTP registration endpoint.
    pub fn register_url(&self) -> String {
        let base = self.http_url.trim_end_matches('/');
        if self.register_path.starts_with('/') {
            format!("{}{}", base, self.register_path)
        } else {
            format!("{}/{}", base, self.register_path)
        }
    }

    /// gRPC endpoint URI, with `http://` added when no scheme is given.
    pub fn grpc_endpoint(&self) -> Option<String> {
        self.grpc_address
            .as_deref()
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| {
                if addr.starts_with("http://") || addr.starts_with("https://") {
                    addr.to_string()
                } else {
                    format!("http://{}", addr)
                }
            })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn default_poll_interval(&self) -> Duration {
        Duration::from_millis(self.default_poll_interval_ms)
    }
}

impl FromStr for WorkerConfig {
    type Err = WorkerError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| WorkerError::config_with_source("failed to parse TOML config", e))
    }
}

impl WorkerConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkerError::config_with_source(
                format!("failed to read config file '{}'", path.display()),
                e,
            )
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `PONEGLYPH_`, for example:
    // - `PONEGLYPH_CAPACITY` overrides `identity.capacity`
    // - `PONEGLYPH_GRPC_ADDRESS` overrides `coordinator.grpc_address`
    //   (an empty value disables gRPC)
    // - `PONEGLYPH_HTTP_URL` overrides `coordinator.http_url`
    // - `PONEGLYPH_RETRY_MAX_RETRIES` overrides `retry.max_retries`
    //
    // Values that fail to parse are ignored.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Identity overrides
        if let Ok(val) = std::env::var("PONEGLYPH_NAME_PREFIX") {
            self.identity.name_prefix = val;
        }
        if let Ok(val) = std::env::var("PONEGLYPH_CAPACITY") {
            if let Ok(v) = val.parse() {
                self.identity.capacity = v;
            }
        }

        // Coordinator overrides
        if let Ok(val) = std::env::var("PONEGLYPH_GRPC_ADDRESS") {
            self.coordinator.grpc_address = if val.trim().is_empty() { None } else { Some(val) };
        }
        if let Ok(val) = std::env::var("PONEGLYPH_HTTP_URL") {
            self.coordinator.http_url = val;
        }
        if let Ok(val) = std::env::var("PONEGLYPH_REGISTER_PATH") {
            self.coordinator.register_path = val;
        }
        if let Ok(val) = std::env::var("PONEGLYPH_CONNECT_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.coordinator.connect_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("PONEGLYPH_REQUEST_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.coordinator.request_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("PONEGLYPH_ATTEMPT_TIMEOUT_MS") {
            if let Ok(v) = val.parse() {
                self.coordinator.attempt_timeout_ms = v;
            }
        }
        if let Ok(val) = std::env::var("PONEGLYPH_DEFAULT_POLL_INTERVAL_MS") {
            if let Ok(v) = val.parse() {
                self.coordinator.default_poll_interval_ms = v;
            }
        }

        // Retry overrides
        if let Ok(val) = std::env::var("PONEGLYPH_RETRY_MAX_RETRIES") {
            if let Ok(v) = val.parse() {
                self.retry.max_retries = v;
            }
        }
        if let Ok(val) = std::env::var("PONEGLYPH_RETRY_INITIAL_DELAY_MS") {
            if let Ok(v) = val.parse() {
                self.retry.initial_delay_ms = v;
            }
        }
        if let Ok(val) = std::env::var("PONEGLYPH_RETRY_MAX_DELAY_MS") {
            if let Ok(v) = val.parse() {
                self.retry.max_delay_ms = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        // Identity validation
        if self.identity.name_prefix.trim().is_empty() {
            return Err(WorkerError::config("identity.name_prefix must not be empty"));
        }
        if self.identity.capacity == 0 {
            return Err(WorkerError::config(
                "identity.capacity must be greater than 0",
            ));
        }

        // Coordinator validation
        let url = self.coordinator.http_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(WorkerError::config(
                "coordinator.http_url must start with http:// or https://",
            ));
        }
        if self.coordinator.connect_timeout_ms == 0 {
            return Err(WorkerError::config(
                "coordinator.connect_timeout_ms must be greater than 0",
            ));
        }
        if self.coordinator.request_timeout_ms == 0 {
            return Err(WorkerError::config(
                "coordinator.request_timeout_ms must be greater than 0",
            ));
        }
        if self.coordinator.attempt_timeout_ms == 0 {
            return Err(WorkerError::config(
                "coordinator.attempt_timeout_ms must be greater than 0",
            ));
        }
        if self.coordinator.default_poll_interval_ms == 0 {
            return Err(WorkerError::config(
                "coordinator.default_poll_interval_ms must be greater than 0",
            ));
        }

        // Retry validation
        if self.retry.backoff_multiplier < 1.0 {
            return Err(WorkerError::config(
                "retry.backoff_multiplier must be at least 1.0",
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(WorkerError::config(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms",
            ));
        }

        Ok(())
    }
}
