//! Bearer tokens issued to host users.
//!
//! Tokens are minted by the host's identity provider and stored in the shared
//! key-value store; this service only looks them up.

use appsync_broadcast::{BroadcastError, KeyValueStore, Result};
use serde::{Deserialize, Serialize};

/// Token TTL in seconds (1 hour).
pub const TOKEN_TTL_SECS: u64 = 3600;

/// Data stored alongside a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
    pub display_name: String,
}

fn token_key(token: &str) -> String {
    format!("api:token:{}", token)
}

pub async fn store_token(kv: &dyn KeyValueStore, token: &str, data: &TokenData) -> Result<()> {
    let value = serde_json::to_string(data)?;
    kv.set_ex(&token_key(token), &value, TOKEN_TTL_SECS).await
}

pub async fn lookup_token(kv: &dyn KeyValueStore, token: &str) -> Result<Option<TokenData>> {
    match kv.get(&token_key(token)).await? {
        Some(v) => {
            let data: TokenData = serde_json::from_str(&v)
                .map_err(|_| BroadcastError::Cache("corrupt token data".to_string()))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}
