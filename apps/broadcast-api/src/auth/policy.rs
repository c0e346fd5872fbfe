//! Identity resolution and channel authorization for the broadcaster.

use std::sync::Arc;

use appsync_broadcast::{
    Access, AuthRequest, ChannelAuthorizer, Identity, KeyValueStore, Result, UserResolver,
};
use async_trait::async_trait;

use crate::auth::tokens;

/// Per-user channels are named `user.{user_id}`.
const USER_CHANNEL_PREFIX: &str = "user.";

/// Resolves the caller from the bearer token forwarded in the auth request.
pub struct TokenUserResolver {
    kv: Arc<dyn KeyValueStore>,
}

impl TokenUserResolver {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl UserResolver for TokenUserResolver {
    async fn resolve(&self, request: &AuthRequest) -> Result<Option<Identity>> {
        let Some(token) = request.caller.as_deref() else {
            return Ok(None);
        };
        Ok(tokens::lookup_token(self.kv.as_ref(), token)
            .await?
            .map(|data| Identity {
                id: data.user_id,
                name: data.display_name,
            }))
    }
}

/// `user.{id}` channels belong to that user alone; every other guarded
/// channel is open to any signed-in user.
pub struct ChannelPolicy;

#[async_trait]
impl ChannelAuthorizer for ChannelPolicy {
    async fn authorize(&self, identity: &Identity, channel: &str) -> Result<Access> {
        if let Some(owner) = channel.strip_prefix(USER_CHANNEL_PREFIX) {
            if owner != identity.id {
                return Ok(Access::Deny);
            }
        }
        Ok(Access::Allow {
            data: Some(serde_json::json!({ "user_id": identity.id })),
        })
    }
}
