//! Ordered, sequential registration across channels.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    Assignment, ChannelKind, HttpChannel, RegistrationChannel, RegistrationRequest,
    RegistrationResult,
};
use crate::config::WorkerConfig;
use crate::error::{ChannelFailure, Result, WorkerError};
use crate::identity::WorkerIdentity;
use crate::metrics::MetricsSource;
use crate::retry::{retry_async, RetryConfig, RetryResult};

/// Registers a worker by trying each channel in order until one succeeds.
///
/// Channels are never used concurrently: each attempt runs to completion
/// (or to its deadline) before the next channel is tried.
pub struct Registrar {
    channels: Vec<Box<dyn RegistrationChannel>>,
    metrics: Arc<dyn MetricsSource>,
    attempt_timeout: Duration,
    default_poll_interval: Duration,
}

impl Registrar {
    /// Create a registrar with no channels.
    pub fn new(metrics: Arc<dyn MetricsSource>) -> Self {
        let defaults = crate::config::CoordinatorConfig::default();
        Self {
            channels: Vec::new(),
            metrics,
            attempt_timeout: defaults.attempt_timeout(),
            default_poll_interval: defaults.default_poll_interval(),
        }
    }

    /// Build the channel list from configuration: gRPC first when an
    /// address is configured, HTTP always.
    pub fn from_config(config: &WorkerConfig, metrics: Arc<dyn MetricsSource>) -> Result<Self> {
        let coordinator = &config.coordinator;
        let mut registrar = Self::new(metrics)
            .with_attempt_timeout(coordinator.attempt_timeout())
            .with_default_poll_interval(coordinator.default_poll_interval());

        #[cfg(feature = "grpc")]
        {
            match super::GrpcChannel::from_config(coordinator) {
                Ok(channel) => registrar = registrar.with_channel(channel),
                Err(WorkerError::ChannelUnconfigured { .. }) => {
                    debug!("No gRPC address configured, registering over HTTP only");
                }
                Err(e) => return Err(e),
            }
        }

        registrar = registrar.with_channel(HttpChannel::from_config(coordinator)?);
        Ok(registrar)
    }

    /// Append a channel. Channels are tried in the order they are added.
    #[must_use]
    pub fn with_channel(mut self, channel: impl RegistrationChannel + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_default_poll_interval(mut self, interval: Duration) -> Self {
        self.default_poll_interval = interval;
        self
    }

    /// Channel order, for diagnostics.
    pub fn channels(&self) -> Vec<ChannelKind> {
        self.channels.iter().map(|c| c.kind()).collect()
    }

    /// Register `identity`, trying each channel once, in order.
    ///
    /// On success the assignment is committed to the identity. When every
    /// channel fails the error is [`WorkerError::Exhausted`] and lists what
    /// each channel reported. An identity that is already registered is
    /// returned as-is without contacting the coordinator.
    pub async fn register_self(&self, identity: &WorkerIdentity) -> RegistrationResult {
        if let Some(existing) = identity.assignment() {
            debug!(worker_id = %existing.worker_id, "Already registered");
            return Ok(existing.clone());
        }

        let usage = match self.metrics.sample() {
            Ok(usage) => Some(usage),
            Err(e) => {
                warn!("Could not sample resource usage: {}", e);
                None
            }
        };

        let request = RegistrationRequest {
            name: identity.name().to_string(),
            capacity: identity.capacity(),
            usage,
        };

        let mut failures = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let kind = channel.kind();
            match self.attempt(channel.as_ref(), &request).await {
                Ok(assignment) => {
                    if identity.commit(assignment.clone()).is_err() {
                        // A concurrent call registered this identity first.
                        if let Some(existing) = identity.assignment() {
                            debug!(
                                worker_id = %existing.worker_id,
                                discarded = %assignment.worker_id,
                                "Identity registered concurrently, keeping existing assignment"
                            );
                            return Ok(existing.clone());
                        }
                    }
                    info!(
                        channel = %kind,
                        name = %request.name,
                        "[{}] Registered as {} (poll={}ms)",
                        kind,
                        assignment.worker_id,
                        assignment.poll_interval_ms()
                    );
                    return Ok(assignment);
                }
                Err(e) => {
                    let cause = e.detail();
                    warn!(channel = %kind, name = %request.name, "[{}] Register failed: {}", kind, cause);
                    failures.push(ChannelFailure::new(e.channel().unwrap_or(kind), cause));
                }
            }
        }

        Err(WorkerError::Exhausted { failures })
    }

    /// Like [`register_self`](Self::register_self), with backoff between
    /// rounds while the failure is retryable.
    pub async fn register_with_retry(
        &self,
        identity: &WorkerIdentity,
        retry: &RetryConfig,
    ) -> Result<Assignment> {
        retry_async(retry, |attempt| async move {
            if attempt > 0 {
                info!(attempt = attempt + 1, "Retrying registration");
            }
            RetryResult::classify(self.register_self(identity).await, WorkerError::is_retryable)
        })
        .await
    }

    async fn attempt(
        &self,
        channel: &dyn RegistrationChannel,
        request: &RegistrationRequest,
    ) -> Result<Assignment> {
        let kind = channel.kind();
        let reply = tokio::time::timeout(self.attempt_timeout, channel.register(request))
            .await
            .map_err(|_| {
                WorkerError::call_failed(
                    kind,
                    format!("no answer within {}ms", self.attempt_timeout.as_millis()),
                )
            })??;

        reply.into_assignment(kind, self.default_poll_interval)
    }
}
