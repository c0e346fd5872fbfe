pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use appsync_broadcast::{BroadcastError, Broadcaster, KeyValueStore};

use auth::policy::{ChannelPolicy, TokenUserResolver};
use config::Config;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KeyValueStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire the broadcaster to this service's token store and channel policy.
    pub fn new(config: Config, kv: Arc<dyn KeyValueStore>) -> Result<Self, BroadcastError> {
        let broadcaster = Broadcaster::new(
            &config.broadcaster,
            kv.clone(),
            Arc::new(TokenUserResolver::new(kv.clone())),
            Arc::new(ChannelPolicy),
        )?;

        Ok(Self {
            kv,
            broadcaster: Arc::new(broadcaster),
            config: Arc::new(config),
        })
    }
}
