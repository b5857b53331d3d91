// rust/worker-core/src/error.rs

use std::fmt;

use thiserror::Error;

use crate::registration::ChannelKind;

#[derive(Error, Debug)]
pub enum WorkerError {

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{channel} channel is not configured")]
    ChannelUnconfigured {
        channel: ChannelKind,
    },

    #[error("{channel} call failed: {message}")]
    ChannelCallFailed {
        channel: ChannelKind,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{channel} registration rejected: {reason}")]
    ChannelRejected {
        channel: ChannelKind,
        reason: String,
    },

    #[error("Registration failed on every channel: {}", FailureList(.failures))]
    Exhausted {
        failures: Vec<ChannelFailure>,
    },

    #[error("Worker already registered as '{worker_id}'")]
    AlreadyRegistered {
        worker_id: String,
    },

    #[error("Metrics error: {message}")]
    Metrics {
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, WorkerError>;

/// A single channel's failure, kept so an exhausted registration can
/// report what every transport said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelFailure {
    pub channel: ChannelKind,
    pub cause: String,
}

impl ChannelFailure {
    pub fn new(channel: ChannelKind, cause: impl Into<String>) -> Self {
        Self {
            channel,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.channel, self.cause)
    }
}

struct FailureList<'a>(&'a [ChannelFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no channels configured");
        }
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

// Convenience constructors
impl WorkerError {

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unconfigured(channel: ChannelKind) -> Self {
        Self::ChannelUnconfigured { channel }
    }

    pub fn call_failed(channel: ChannelKind, message: impl Into<String>) -> Self {
        Self::ChannelCallFailed {
            channel,
            message: message.into(),
            source: None,
        }
    }

    pub fn call_failed_with_source(
        channel: ChannelKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ChannelCallFailed {
            channel,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn rejected(channel: ChannelKind, reason: impl Into<String>) -> Self {
        Self::ChannelRejected {
            channel,
            reason: reason.into(),
        }
    }

    pub fn metrics(message: impl Into<String>) -> Self {
        Self::Metrics {
            message: message.into(),
        }
    }

    /// Returns true if a later registration attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChannelCallFailed { .. } | Self::ChannelRejected { .. } | Self::Exhausted { .. }
        )
    }

    /// This error followed by every underlying source, joined with `: `.
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let text = cause.to_string();
            // reqwest and hyper sometimes repeat the inner message.
            if !detail.ends_with(&text) {
                detail.push_str(": ");
                detail.push_str(&text);
            }
            source = cause.source();
        }
        detail
    }

    /// The channel this error originated from, if any.
    pub fn channel(&self) -> Option<ChannelKind> {
        match self {
            Self::ChannelUnconfigured { channel }
            | Self::ChannelCallFailed { channel, .. }
            | Self::ChannelRejected { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}
