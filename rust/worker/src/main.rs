//! Poneglyph Worker
//!
//! Registers this process with a Poneglyph coordinator, over gRPC when an
//! address is given and over HTTP otherwise or as fallback.
//!
//! # Usage
//!
//! ```bash
//! # Register over HTTP with the default coordinator URL
//! poneglyph-worker
//!
//! # Prefer gRPC, fall back to HTTP
//! poneglyph-worker --grpc-address localhost:50051 --http-url http://localhost:8080
//!
//! # Start with configuration file
//! poneglyph-worker --config worker.toml
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use worker_core::{Registrar, RetryConfig, SystemMetrics, WorkerConfig, WorkerIdentity};

/// Poneglyph Worker
#[derive(Parser, Debug)]
#[command(name = "poneglyph-worker")]
#[command(about = "Registers a worker with a Poneglyph coordinator")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// gRPC coordinator address (host:port); HTTP only when unset
    #[arg(long)]
    grpc_address: Option<String>,

    /// Base URL of the coordinator HTTP API
    #[arg(long)]
    http_url: Option<String>,

    /// Concurrent task slots to offer
    #[arg(long)]
    capacity: Option<u32>,

    /// Prefix for the generated worker name
    #[arg(long)]
    name_prefix: Option<String>,

    /// Try each channel once and exit on failure
    #[arg(long)]
    no_retry: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut WorkerConfig) {
        if let Some(address) = &self.grpc_address {
            config.coordinator.grpc_address = Some(address.clone());
        }
        if let Some(url) = &self.http_url {
            config.coordinator.http_url = url.clone();
        }
        if let Some(capacity) = self.capacity {
            config.identity.capacity = capacity;
        }
        if let Some(prefix) = &self.name_prefix {
            config.identity.name_prefix = prefix.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // File, then environment, then command line
    let mut config = match &args.config {
        Some(path) => WorkerConfig::from_file(path)?,
        None => WorkerConfig::default(),
    }
    .with_env_overrides();
    args.apply(&mut config);
    config.validate()?;

    let retry = if args.no_retry {
        RetryConfig::no_retry()
    } else {
        RetryConfig::from(&config.retry)
    };

    let registrar = Registrar::from_config(&config, Arc::new(SystemMetrics::primed().await))?;
    let identity = WorkerIdentity::generate(&config.identity.name_prefix, config.identity.capacity);

    tracing::info!("Starting Poneglyph worker {}", identity.name());
    tracing::info!("  Capacity: {}", identity.capacity());
    tracing::info!("  Channels: {:?}", registrar.channels());
    tracing::info!("  Max retries: {}", retry.max_retries);

    let assignment = tokio::select! {
        result = registrar.register_with_retry(&identity, &retry) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted before registration completed");
            return Ok(());
        }
    };

    tracing::info!(
        worker_id = %assignment.worker_id,
        channel = %assignment.channel,
        poll_ms = assignment.poll_interval_ms(),
        "Worker registered"
    );

    Ok(())
}
