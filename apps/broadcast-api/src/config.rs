use appsync_broadcast::{BroadcastError, BroadcasterConfig};

/// Broadcast API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Gateway, credential and cache settings for the broadcaster.
    pub broadcaster: BroadcasterConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails with the dotted name of the first missing broadcaster key.
    pub fn from_env() -> Result<Self, BroadcastError> {
        Ok(Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4010),
            broadcaster: BroadcasterConfig::from_env()?,
        })
    }
}
