// rust/worker-core/src/lib.rs

//! Poneglyph Worker - Core Library
//!
//! This crate registers a worker process with a Poneglyph coordinator. It
//! tries gRPC first and falls back to JSON over HTTP, keeping one worker
//! name across both, and exposes the configuration, error, metrics, and
//! retry pieces the worker binary is built from.

pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod registration;
pub mod retry;

// Re-export commonly used types for convenience
pub use config::WorkerConfig;
pub use error::{ChannelFailure, Result, WorkerError};
pub use identity::WorkerIdentity;
pub use metrics::{MetricsSource, ResourceUsage, StaticMetrics, SystemMetrics};
pub use registration::{
    Assignment, ChannelKind, ChannelReply, HttpChannel, Registrar, RegistrationChannel,
    RegistrationRequest,
};
#[cfg(feature = "grpc")]
pub use registration::GrpcChannel;
pub use retry::RetryConfig;
