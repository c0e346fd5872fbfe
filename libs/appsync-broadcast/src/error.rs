use thiserror::Error;

use crate::envelope::ChannelFailure;

pub type Result<T, E = BroadcastError> = std::result::Result<T, E>;

/// Every failure the broadcaster can surface to its host.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// A required configuration key is missing or empty.
    #[error("broadcaster configuration is missing required key `{key}`")]
    Config { key: String },

    /// The token endpoint did not issue a credential.
    #[error("failed to obtain gateway credential: {message}")]
    Auth {
        message: String,
        body: Option<String>,
    },

    /// The gateway rejected the credential (HTTP 401).
    #[error("gateway rejected the credential")]
    Unauthorized,

    /// No response was received from a remote endpoint.
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-2xx, non-401 status.
    #[error("gateway responded with {status}: {body}")]
    Gateway { status: u16, body: String },

    #[error("access denied to channel `{channel}`")]
    AccessDenied { channel: String },

    /// Every channel of a broadcast failed (or any, under the strict policy).
    #[error("broadcast failed: {}", describe_failures(.failures))]
    AggregateBroadcast { failures: Vec<ChannelFailure> },

    #[error("cache store error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BroadcastError {
    pub fn config(key: impl Into<String>) -> Self {
        Self::Config { key: key.into() }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            body: None,
        }
    }

    pub fn access_denied(channel: impl Into<String>) -> Self {
        Self::AccessDenied {
            channel: channel.into(),
        }
    }

    /// Only transport failures are worth another attempt against the gateway.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<redis::RedisError> for BroadcastError {
    fn from(err: redis::RedisError) -> Self {
        Self::Cache(err.to_string())
    }
}

fn describe_failures(failures: &[ChannelFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.channel, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
