//! The broadcaster: publishes events to namespaced channels and authorizes
//! subscribers of guarded channels.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::channel::{ChannelClassifier, ChannelKind};
use crate::config::{BroadcasterConfig, FailurePolicy};
use crate::credentials::{CredentialCache, TokenProvider};
use crate::delivery::{AppSyncDelivery, EventDelivery};
use crate::envelope::{BroadcastEnvelope, BroadcastOutcome, ChannelFailure};
use crate::error::{BroadcastError, Result};
use crate::kv::KeyValueStore;
use crate::observe::{BroadcastEvent, EventSink, TracingSink};
use crate::retry::RetryPolicy;

// ---------------------------------------------------------------------------
// Host collaborators
// ---------------------------------------------------------------------------

/// The caller behind an auth request, as the host knows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
}

/// Inbound subscriber authentication request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthRequest {
    /// Fully-qualified channel the subscriber wants to join.
    pub channel_name: String,
    /// Opaque caller credential forwarded by the host, e.g. a bearer token.
    #[serde(skip)]
    pub caller: Option<String>,
}

impl AuthRequest {
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            ..Self::default()
        }
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// Decision of a [`ChannelAuthorizer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Access {
    Deny,
    /// `data` object fields are added to presence `user_info`.
    Allow { data: Option<Value> },
}

/// Resolves who is making an auth request. `None` means anonymous.
#[async_trait]
pub trait UserResolver: Send + Sync {
    async fn resolve(&self, request: &AuthRequest) -> Result<Option<Identity>>;
}

/// Decides whether an identity may join a guarded channel. Receives the
/// channel name without its namespace and access prefix.
#[async_trait]
pub trait ChannelAuthorizer: Send + Sync {
    async fn authorize(&self, identity: &Identity, channel: &str) -> Result<Access>;
}

// ---------------------------------------------------------------------------
// Auth response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AuthGrant {
    /// Gateway credential for a guarded channel.
    Credential(String),
    /// Public channels need no credential.
    Open(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceData {
    pub user_id: String,
    pub user_info: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResponse {
    pub auth: AuthGrant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<PresenceData>,
}

impl AuthResponse {
    pub fn open() -> Self {
        Self {
            auth: AuthGrant::Open(true),
            channel_data: None,
        }
    }

    pub fn credential(token: String) -> Self {
        Self {
            auth: AuthGrant::Credential(token),
            channel_data: None,
        }
    }

    pub fn presence(token: String, identity: &Identity, data: Option<Value>) -> Self {
        let mut user_info = match data {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        user_info.insert("name".into(), Value::String(identity.name.clone()));
        user_info.insert(
            "timestamp".into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );

        Self {
            auth: AuthGrant::Credential(token),
            channel_data: Some(PresenceData {
                user_id: identity.id.clone(),
                user_info,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Everything the broadcaster delegates to.
pub struct Collaborators {
    pub tokens: Arc<dyn TokenProvider>,
    pub delivery: Arc<dyn EventDelivery>,
    pub users: Arc<dyn UserResolver>,
    pub authorizer: Arc<dyn ChannelAuthorizer>,
    pub sink: Arc<dyn EventSink>,
}

pub struct Broadcaster {
    channels: ChannelClassifier,
    tokens: Arc<dyn TokenProvider>,
    delivery: Arc<dyn EventDelivery>,
    users: Arc<dyn UserResolver>,
    authorizer: Arc<dyn ChannelAuthorizer>,
    sink: Arc<dyn EventSink>,
    retry: RetryPolicy,
    failure_policy: FailurePolicy,
}

impl Broadcaster {
    /// Build a broadcaster that talks to the configured gateway and logs
    /// through `tracing`.
    pub fn new(
        config: &BroadcasterConfig,
        store: Arc<dyn KeyValueStore>,
        users: Arc<dyn UserResolver>,
        authorizer: Arc<dyn ChannelAuthorizer>,
    ) -> Result<Self> {
        Self::with_sink(config, store, users, authorizer, Arc::new(TracingSink))
    }

    pub fn with_sink(
        config: &BroadcasterConfig,
        store: Arc<dyn KeyValueStore>,
        users: Arc<dyn UserResolver>,
        authorizer: Arc<dyn ChannelAuthorizer>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        // Validate before building any client.
        config.validate()?;

        let tokens: Arc<dyn TokenProvider> =
            Arc::new(CredentialCache::new(config, store, sink.clone())?);
        let delivery = Arc::new(AppSyncDelivery::new(config.event_url(), tokens.clone()));

        Self::from_parts(
            config,
            Collaborators {
                tokens,
                delivery,
                users,
                authorizer,
                sink,
            },
        )
    }

    pub fn from_parts(config: &BroadcasterConfig, parts: Collaborators) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            channels: ChannelClassifier::new(&config.namespace),
            tokens: parts.tokens,
            delivery: parts.delivery,
            users: parts.users,
            authorizer: parts.authorizer,
            sink: parts.sink,
            retry: RetryPolicy::default(),
            failure_policy: config.failure_policy,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Publish `event` to every channel, in order.
    ///
    /// Each channel is delivered independently; one failing channel never
    /// stops the others. The call fails only when every channel failed, or
    /// when any did under [`FailurePolicy::Strict`].
    pub async fn broadcast<S: AsRef<str>>(
        &self,
        channels: &[S],
        event: &str,
        payload: &Map<String, Value>,
    ) -> Result<BroadcastOutcome> {
        let mut outcome = BroadcastOutcome::default();

        for channel in channels {
            let channel = self.channels.qualify(channel.as_ref());
            match self.deliver(&channel, event, payload).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    let error = e.to_string();
                    self.sink.emit(BroadcastEvent::ChannelFailed {
                        channel: channel.clone(),
                        error: error.clone(),
                    });
                    outcome.failures.push(ChannelFailure::new(channel, error));
                }
            }
        }

        let strict_failure =
            self.failure_policy == FailurePolicy::Strict && !outcome.failures.is_empty();
        if outcome.all_failed() || strict_failure {
            return Err(BroadcastError::AggregateBroadcast {
                failures: outcome.failures,
            });
        }

        if outcome.is_partial() {
            self.sink.emit(BroadcastEvent::PartialFailure {
                failures: outcome.failures.clone(),
                succeeded: outcome.succeeded,
            });
        }

        Ok(outcome)
    }

    /// Deliver to one channel, refreshing the credential once on a 401.
    async fn deliver(&self, channel: &str, event: &str, payload: &Map<String, Value>) -> Result<()> {
        match self.broadcast_to_channel(channel, event, payload).await {
            Err(e) if e.is_unauthorized() => {
                self.sink.emit(BroadcastEvent::CredentialRejected {
                    channel: channel.to_string(),
                });
                self.tokens.invalidate().await?;
                self.delivery.reset().await;
                self.broadcast_to_channel(channel, event, payload).await
            }
            other => other,
        }
    }

    /// Deliver to one fully-qualified channel, retrying transport failures
    /// with linear backoff. A 401 is returned immediately without using the
    /// retry budget.
    pub async fn broadcast_to_channel(
        &self,
        channel: &str,
        event: &str,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            let envelope = BroadcastEnvelope::new(channel, event, payload);
            match self.delivery.send(channel, &envelope).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && self.retry.has_attempts_after(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    self.sink.emit(BroadcastEvent::DeliveryRetry {
                        channel: channel.to_string(),
                        attempt,
                        delay,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Authorize a subscriber for `request.channel_name`.
    ///
    /// Public channels are granted without consulting the resolver. Guarded
    /// channels need a resolved identity the authorizer accepts, and return a
    /// gateway credential (plus `channel_data` for presence channels).
    pub async fn auth(&self, request: &AuthRequest) -> Result<AuthResponse> {
        let channel = request.channel_name.as_str();
        let kind = self.channels.classify(channel);
        if !kind.is_guarded() {
            return Ok(AuthResponse::open());
        }

        let result = self.auth_guarded(request, kind).await;
        if let Err(e) = &result {
            if !matches!(e, BroadcastError::AccessDenied { .. }) {
                self.sink.emit(BroadcastEvent::AuthFailed {
                    channel: channel.to_string(),
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn auth_guarded(&self, request: &AuthRequest, kind: ChannelKind) -> Result<AuthResponse> {
        let channel = request.channel_name.as_str();
        let normalized = self.channels.normalize(channel);

        let Some(identity) = self.users.resolve(request).await? else {
            return Err(self.deny(channel, "no authenticated user".to_string()));
        };

        let data = match self.authorizer.authorize(&identity, normalized).await? {
            Access::Allow { data } => data,
            Access::Deny => {
                return Err(self.deny(channel, format!("user {} is not authorized", identity.id)));
            }
        };

        let token = self.tokens.get_token().await?;
        Ok(match kind {
            ChannelKind::Presence => AuthResponse::presence(token, &identity, data),
            _ => AuthResponse::credential(token),
        })
    }

    fn deny(&self, channel: &str, reason: String) -> BroadcastError {
        self.sink.emit(BroadcastEvent::AccessDenied {
            channel: channel.to_string(),
            reason,
        });
        BroadcastError::access_denied(channel)
    }
}
