//! Observability events emitted by the broadcaster.
//!
//! Notable outcomes go through an injected [`EventSink`] instead of being
//! logged directly, so a host can route them anywhere and tests can assert on
//! them. [`TracingSink`] is the default and forwards to `tracing`.

use std::sync::Mutex;
use std::time::Duration;

use crate::envelope::ChannelFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastEvent {
    /// A transport failure will be retried after `delay`.
    DeliveryRetry {
        channel: String,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// The gateway answered 401; the credential is being refreshed.
    CredentialRejected { channel: String },
    ChannelFailed { channel: String, error: String },
    /// Some channels failed, but the broadcast as a whole succeeded.
    PartialFailure {
        failures: Vec<ChannelFailure>,
        succeeded: usize,
    },
    TokenIssued { expires_in: u64 },
    /// The token endpoint could not be reached; the request is retried.
    TokenRequestRetry { attempt: u32, error: String },
    TokenIssueFailed {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },
    AccessDenied { channel: String, reason: String },
    AuthFailed { channel: String, error: String },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: BroadcastEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: BroadcastEvent) {
        match event {
            BroadcastEvent::DeliveryRetry {
                channel,
                attempt,
                delay,
                error,
            } => {
                tracing::warn!(%channel, attempt, ?delay, %error, "broadcast delivery failed, retrying");
            }
            BroadcastEvent::CredentialRejected { channel } => {
                tracing::info!(%channel, "gateway rejected credential, refreshing");
            }
            BroadcastEvent::ChannelFailed { channel, error } => {
                tracing::error!(%channel, %error, "broadcast to channel failed");
            }
            BroadcastEvent::PartialFailure {
                failures,
                succeeded,
            } => {
                let channels: Vec<&str> = failures.iter().map(|f| f.channel.as_str()).collect();
                tracing::warn!(?channels, succeeded, "broadcast partially failed");
            }
            BroadcastEvent::TokenIssued { expires_in } => {
                tracing::info!(expires_in, "gateway credential issued");
            }
            BroadcastEvent::TokenRequestRetry { attempt, error } => {
                tracing::warn!(attempt, %error, "token request failed, retrying");
            }
            BroadcastEvent::TokenIssueFailed {
                status,
                message,
                body,
            } => {
                tracing::error!(?status, %message, ?body, "gateway credential request failed");
            }
            BroadcastEvent::AccessDenied { channel, reason } => {
                tracing::warn!(%channel, %reason, "channel access denied");
            }
            BroadcastEvent::AuthFailed { channel, error } => {
                tracing::error!(%channel, %error, "channel authentication failed");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<BroadcastEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BroadcastEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Delays of every recorded delivery retry, in order.
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                BroadcastEvent::DeliveryRetry { delay, .. } => Some(delay),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: BroadcastEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
