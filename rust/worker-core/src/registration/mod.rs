//! Worker registration with the coordinator.
//!
//! This module provides the channels a worker can register through and
//! the [`Registrar`] that drives them:
//!
//! - gRPC (`CoordinatorService.RegisterWorker`), preferred when configured
//! - HTTP (JSON `POST` to the coordinator API), always available as fallback
//!
//! Channels are tried one after another in the order they were added,
//! stopping at the first valid assignment.
//!
//! # Feature
//!
//! The gRPC channel requires the `grpc` feature (enabled by default).

#[cfg(feature = "grpc")]
mod grpc;
mod http;
pub mod protocol;
mod registrar;

// Include generated protobuf code
#[cfg(feature = "grpc")]
pub mod proto {
    include!("proto/poneglyph.coordinator.rs");
}

use async_trait::async_trait;

use crate::error::Result;

// Re-exports
#[cfg(feature = "grpc")]
pub use grpc::GrpcChannel;
pub use http::{HttpChannel, HttpRegisterRequest, HttpRegisterResponse};
pub use protocol::{Assignment, ChannelKind, ChannelReply, RegistrationRequest, RegistrationResult};
pub use registrar::Registrar;

/// One transport through which a worker can register.
#[async_trait]
pub trait RegistrationChannel: Send + Sync {
    /// Which transport this is, for logs and failure reports.
    fn kind(&self) -> ChannelKind;

    /// Sends one registration request and returns the coordinator's raw
    /// reply. Network and protocol failures are errors; a reachable
    /// coordinator that declines is an `Ok` reply with `ok == false`.
    async fn register(&self, request: &RegistrationRequest) -> Result<ChannelReply>;
}
