//! Gateway credential acquisition and caching.
//!
//! Tokens come from an OAuth2 client-credentials endpoint and are cached in
//! two tiers: a single in-process slot and the shared key-value store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::BroadcasterConfig;
use crate::error::{BroadcastError, Result};
use crate::kv::KeyValueStore;
use crate::observe::{BroadcastEvent, EventSink};

/// Shared-cache entries are evicted this long before the remote token expires.
pub const EXPIRY_BUFFER_SECS: u64 = 60;
/// Lower bound on the shared-cache TTL.
pub const MIN_CACHE_TTL_SECS: u64 = 1;

const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const TOKEN_TRANSPORT_RETRIES: u32 = 2;
const TOKEN_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Used when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Source of the bearer credential used against the gateway.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<String>;
    /// Forget any cached credential so the next `get_token` fetches anew.
    async fn invalidate(&self) -> Result<()>;
}

/// A bearer token and the instant after which it must not be served.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credential {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl Credential {
    fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

/// Shared-cache TTL for a token that lives `expires_in` seconds.
pub fn cache_ttl(expires_in: u64) -> u64 {
    expires_in
        .saturating_sub(EXPIRY_BUFFER_SECS)
        .max(MIN_CACHE_TTL_SECS)
}

pub struct CredentialCache {
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cache_key: String,
    http: reqwest::Client,
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn EventSink>,
    slot: RwLock<Option<Credential>>,
}

impl CredentialCache {
    pub fn new(
        config: &BroadcasterConfig,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(TOKEN_TIMEOUT)
            .build()
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;

        Ok(Self {
            token_url: config.token_url(),
            client_id: config.options.cognito_client_id.clone(),
            client_secret: config.options.cognito_client_secret.clone(),
            scope: config.token_scope().to_string(),
            cache_key: config.token_cache_key(),
            http,
            store,
            sink,
            slot: RwLock::new(None),
        })
    }

    async fn read_shared(&self) -> Result<Option<Credential>> {
        let Some(raw) = self.store.get(&self.cache_key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Credential>(&raw) {
            Ok(credential) if credential.is_fresh() => Ok(Some(credential)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::debug!(?e, key = %self.cache_key, "ignoring unreadable cached credential");
                Ok(None)
            }
        }
    }

    async fn fetch_new_token(&self) -> Result<Credential> {
        let response = self.request_token().await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            self.issue_failed(Some(status.as_u16()), format!("unreadable token response: {e}"), None)
        })?;

        if !status.is_success() {
            return Err(self.issue_failed(
                Some(status.as_u16()),
                format!("token endpoint responded with {status}"),
                Some(body),
            ));
        }

        let parsed = serde_json::from_str::<TokenResponse>(&body).ok();
        let Some(TokenResponse {
            access_token: Some(access_token),
            expires_in,
        }) = parsed
        else {
            return Err(self.issue_failed(
                Some(status.as_u16()),
                "token response is missing access_token".to_string(),
                Some(body),
            ));
        };

        let expires_in = expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let ttl = cache_ttl(expires_in);
        let expires_at = i64::try_from(ttl)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                self.issue_failed(
                    Some(status.as_u16()),
                    format!("token lifetime out of range: expires_in={expires_in}"),
                    None,
                )
            })?;
        let credential = Credential {
            access_token,
            expires_at,
        };

        let value = serde_json::to_string(&credential)?;
        self.store.set_ex(&self.cache_key, &value, ttl).await?;
        self.sink.emit(BroadcastEvent::TokenIssued { expires_in });

        Ok(credential)
    }

    /// POST the client-credentials grant, retrying connection-level failures.
    async fn request_token(&self) -> Result<reqwest::Response> {
        let form = [
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let mut retries = 0;
        loop {
            match self.http.post(&self.token_url).form(&form).send().await {
                Ok(response) => return Ok(response),
                Err(e) if retries < TOKEN_TRANSPORT_RETRIES && (e.is_connect() || e.is_timeout()) => {
                    retries += 1;
                    self.sink.emit(BroadcastEvent::TokenRequestRetry {
                        attempt: retries,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(TOKEN_RETRY_DELAY).await;
                }
                Err(e) => {
                    return Err(self.issue_failed(None, format!("token request failed: {e}"), None));
                }
            }
        }
    }

    fn issue_failed(&self, status: Option<u16>, message: String, body: Option<String>) -> BroadcastError {
        self.sink.emit(BroadcastEvent::TokenIssueFailed {
            status,
            message: message.clone(),
            body: body.clone(),
        });
        BroadcastError::Auth { message, body }
    }
}

#[async_trait]
impl TokenProvider for CredentialCache {
    async fn get_token(&self) -> Result<String> {
        {
            let slot = self.slot.read().await;
            if let Some(credential) = slot.as_ref().filter(|c| c.is_fresh()) {
                return Ok(credential.access_token.clone());
            }
        }

        let credential = match self.read_shared().await? {
            Some(credential) => credential,
            None => self.fetch_new_token().await?,
        };

        let token = credential.access_token.clone();
        *self.slot.write().await = Some(credential);
        Ok(token)
    }

    async fn invalidate(&self) -> Result<()> {
        *self.slot.write().await = None;
        self.store.del(&self.cache_key).await
    }
}
