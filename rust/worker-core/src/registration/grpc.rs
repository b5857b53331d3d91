//! gRPC registration channel.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;
use tonic::Request;
use tracing::debug;

use super::proto::coordinator_service_client::CoordinatorServiceClient;
use super::proto::RegisterWorkerRequest;
use super::{ChannelKind, ChannelReply, RegistrationChannel, RegistrationRequest};
use crate::config::CoordinatorConfig;
use crate::error::{Result, WorkerError};

/// Registers through `CoordinatorService.RegisterWorker`.
///
/// A fresh connection is made per call; registration happens once per
/// process so there is nothing to keep warm.
#[derive(Debug, Clone)]
pub struct GrpcChannel {
    endpoint: Endpoint,
    address: String,
}

impl GrpcChannel {
    /// Create a channel for `address` (`http://host:port`).
    pub fn new(address: impl Into<String>, connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let address = address.into();
        let endpoint = Endpoint::from_shared(address.clone())
            .map_err(|e| WorkerError::config_with_source(format!("invalid gRPC address '{}'", address), e))?
            .connect_timeout(connect_timeout)
            .timeout(request_timeout);

        Ok(Self { endpoint, address })
    }

    /// Build from configuration.
    ///
    /// Returns `ChannelUnconfigured` when no gRPC address is set, which
    /// callers treat as "skip this channel" rather than a failure.
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        let address = config
            .grpc_endpoint()
            .ok_or_else(|| WorkerError::unconfigured(ChannelKind::Grpc))?;
        Self::new(address, config.connect_timeout(), config.request_timeout())
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl RegistrationChannel for GrpcChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Grpc
    }

    async fn register(&self, request: &RegistrationRequest) -> Result<ChannelReply> {
        debug!(address = %self.address, name = %request.name, "Connecting to coordinator");

        let channel = self.endpoint.connect().await.map_err(|e| {
            WorkerError::call_failed_with_source(
                ChannelKind::Grpc,
                format!("failed to connect to coordinator at {}", self.address),
                e,
            )
        })?;
        let mut client = CoordinatorServiceClient::new(channel);

        let response = client
            .register_worker(Request::new(RegisterWorkerRequest {
                name: request.name.clone(),
                capacity: request.capacity,
            }))
            .await
            .map_err(|status| {
                WorkerError::call_failed(
                    ChannelKind::Grpc,
                    format!("RegisterWorker returned {:?}: {}", status.code(), status.message()),
                )
            })?
            .into_inner();

        Ok(ChannelReply {
            ok: response.ok,
            worker_id: response.worker_id,
            poll_interval_ms: u64::from(response.poll_interval_ms),
            message: Some(response.message).filter(|m| !m.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_without_address() {
        let config = CoordinatorConfig::default();
        let err = GrpcChannel::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            WorkerError::ChannelUnconfigured {
                channel: ChannelKind::Grpc
            }
        ));
    }

    #[test]
    fn test_from_config_adds_scheme() {
        let config = CoordinatorConfig {
            grpc_address: Some("127.0.0.1:50051".into()),
            ..Default::default()
        };
        let channel = GrpcChannel::from_config(&config).unwrap();
        assert_eq!(channel.address(), "http://127.0.0.1:50051");
        assert_eq!(channel.kind(), ChannelKind::Grpc);
    }

    #[test]
    fn test_invalid_address() {
        let result = GrpcChannel::new(
            "http://bad address",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(WorkerError::Config { .. })));
    }
}
