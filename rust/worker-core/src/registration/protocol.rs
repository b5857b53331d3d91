//! Transport-neutral registration types.
//!
//! Every channel speaks its own wire format but reports back through
//! [`ChannelReply`], so the validity rule for an assignment lives in one
//! place: [`ChannelReply::into_assignment`].

use std::fmt;
use std::time::Duration;

use crate::error::{Result, WorkerError};
use crate::metrics::ResourceUsage;

/// Transport a registration attempt went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Grpc,
    Http,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grpc => f.write_str("gRPC"),
            Self::Http => f.write_str("HTTP"),
        }
    }
}

/// What a worker sends to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    /// Worker name, identical across channels for one identity.
    pub name: String,
    /// Concurrent task slots offered.
    pub capacity: u32,
    /// Resource usage at registration time, when it could be sampled.
    pub usage: Option<ResourceUsage>,
}

/// Raw answer from a channel, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelReply {
    pub ok: bool,
    pub worker_id: String,
    pub poll_interval_ms: u64,
    pub message: Option<String>,
}

impl ChannelReply {
    pub fn accepted(worker_id: impl Into<String>, poll_interval_ms: u64) -> Self {
        Self {
            ok: true,
            worker_id: worker_id.into(),
            poll_interval_ms,
            message: None,
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Turns the reply into an [`Assignment`].
    ///
    /// The reply counts only when the coordinator said ok *and* handed
    /// out a non-empty identifier. A zero poll interval falls back to
    /// `default_poll`.
    pub fn into_assignment(self, channel: ChannelKind, default_poll: Duration) -> Result<Assignment> {
        if !self.ok {
            let reason = self
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "coordinator declined registration".to_string());
            return Err(WorkerError::rejected(channel, reason));
        }

        let worker_id = self.worker_id.trim();
        if worker_id.is_empty() {
            return Err(WorkerError::rejected(
                channel,
                "coordinator returned an empty worker id",
            ));
        }

        let poll_interval = if self.poll_interval_ms == 0 {
            default_poll
        } else {
            Duration::from_millis(self.poll_interval_ms)
        };

        Ok(Assignment {
            worker_id: worker_id.to_string(),
            poll_interval,
            channel,
        })
    }
}

/// A successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Identifier assigned by the coordinator. Never empty.
    pub worker_id: String,
    /// How often the worker should poll for tasks.
    pub poll_interval: Duration,
    /// Channel that produced the assignment.
    pub channel: ChannelKind,
}

impl Assignment {
    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval.as_millis() as u64
    }
}

/// Outcome of one top-level registration call.
pub type RegistrationResult = Result<Assignment>;
