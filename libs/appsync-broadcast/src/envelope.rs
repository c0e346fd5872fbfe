//! Wire envelope for published events and the per-call broadcast result.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// One event as the gateway delivers it to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEnvelope {
    pub event: String,
    pub data: Map<String, Value>,
    pub channel: String,
    /// ISO-8601, UTC.
    pub timestamp: String,
}

impl BroadcastEnvelope {
    /// Build an envelope stamped with the current time.
    pub fn new(channel: &str, event: &str, data: &Map<String, Value>) -> Self {
        Self {
            event: event.to_string(),
            data: data.clone(),
            channel: channel.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Request body of the gateway's event endpoint. Each event is itself a JSON
/// string.
#[derive(Debug, Serialize)]
pub struct PublishRequest<'a> {
    pub channel: &'a str,
    pub events: Vec<String>,
}

impl<'a> PublishRequest<'a> {
    pub fn single(channel: &'a str, envelope: &BroadcastEnvelope) -> serde_json::Result<Self> {
        Ok(Self {
            channel,
            events: vec![serde_json::to_string(envelope)?],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFailure {
    pub channel: String,
    pub error: String,
}

impl ChannelFailure {
    pub fn new(channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            error: error.into(),
        }
    }
}

/// Aggregate result of one broadcast call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub succeeded: usize,
    /// In the order the channels were given.
    pub failures: Vec<ChannelFailure>,
}

impl BroadcastOutcome {
    pub fn all_failed(&self) -> bool {
        self.succeeded == 0 && !self.failures.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        self.succeeded > 0 && !self.failures.is_empty()
    }

    pub fn failed_channels(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.channel.clone()).collect()
    }
}
