#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use appsync_broadcast::{
    Access, AuthRequest, BroadcastEnvelope, BroadcastError, Broadcaster, BroadcasterConfig,
    ChannelAuthorizer, Collaborators, EventDelivery, Identity, MemorySink, Result, RetryPolicy,
    TokenProvider, UserResolver,
};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A valid configuration with namespace `app`.
pub fn test_config() -> BroadcasterConfig {
    serde_json::from_value(serde_json::json!({
        "namespace": "app",
        "app_id": "abc123",
        "region": "eu-west-1",
        "cache": { "driver": "memory", "prefix": "test:" },
        "options": {
            "cognito_pool": "pool",
            "cognito_region": "eu-west-1",
            "cognito_client_id": "client-id",
            "cognito_client_secret": "client-secret"
        }
    }))
    .expect("test config")
}

/// Configuration pointing both endpoints at a mock server.
pub fn mock_config(base_url: &str) -> BroadcasterConfig {
    let mut config = test_config();
    config.endpoints.token_url = Some(format!("{base_url}/oauth2/token"));
    config.endpoints.event_url = Some(format!("{base_url}/event"));
    config
}

pub fn payload() -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("order_id".into(), Value::from(7));
    data
}

// ---------------------------------------------------------------------------
// Token provider
// ---------------------------------------------------------------------------

/// Hands out `token-{generation}`; each invalidation bumps the generation.
#[derive(Default)]
pub struct CountingTokens {
    pub fetches: AtomicUsize,
    pub invalidations: AtomicUsize,
    pub fail: bool,
}

impl CountingTokens {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for CountingTokens {
    async fn get_token(&self) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BroadcastError::auth("token endpoint unavailable"));
        }
        Ok(format!("token-{}", self.invalidations()))
    }

    async fn invalidate(&self) -> Result<()> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Ok,
    Transport,
    Gateway(u16),
    Unauthorized,
}

impl Step {
    fn into_result(self) -> Result<()> {
        match self {
            Step::Ok => Ok(()),
            Step::Transport => Err(BroadcastError::Transport("connection reset".into())),
            Step::Gateway(status) => Err(BroadcastError::Gateway {
                status,
                body: "gateway says no".into(),
            }),
            Step::Unauthorized => Err(BroadcastError::Unauthorized),
        }
    }
}

/// Plays back a per-channel script; a channel with an exhausted script
/// succeeds.
#[derive(Default)]
pub struct ScriptedDelivery {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    sent: Mutex<Vec<BroadcastEnvelope>>,
    pub resets: AtomicUsize,
}

impl ScriptedDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, channel: &str, steps: &[Step]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(channel.to_string(), steps.iter().copied().collect());
        self
    }

    pub fn sent(&self) -> Vec<BroadcastEnvelope> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self, channel: &str) -> usize {
        self.sent().iter().filter(|e| e.channel == channel).count()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventDelivery for ScriptedDelivery {
    async fn send(&self, channel: &str, envelope: &BroadcastEnvelope) -> Result<()> {
        self.sent.lock().unwrap().push(envelope.clone());
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(channel)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Ok);
        step.into_result()
    }

    async fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Host collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FixedUsers {
    pub identity: Option<Identity>,
    pub calls: AtomicUsize,
}

impl FixedUsers {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(id: &str, name: &str) -> Self {
        Self {
            identity: Some(Identity {
                id: id.to_string(),
                name: name.to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserResolver for FixedUsers {
    async fn resolve(&self, _request: &AuthRequest) -> Result<Option<Identity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.identity.clone())
    }
}

pub struct FixedAuthorizer {
    pub access: Access,
    pub channels: Mutex<Vec<String>>,
}

impl FixedAuthorizer {
    pub fn allow() -> Self {
        Self::with(Access::Allow { data: None })
    }

    pub fn deny() -> Self {
        Self::with(Access::Deny)
    }

    pub fn with(access: Access) -> Self {
        Self {
            access,
            channels: Mutex::new(Vec::new()),
        }
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAuthorizer for FixedAuthorizer {
    async fn authorize(&self, _identity: &Identity, channel: &str) -> Result<Access> {
        self.channels.lock().unwrap().push(channel.to_string());
        Ok(self.access.clone())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub broadcaster: Broadcaster,
    pub tokens: Arc<CountingTokens>,
    pub delivery: Arc<ScriptedDelivery>,
    pub users: Arc<FixedUsers>,
    pub authorizer: Arc<FixedAuthorizer>,
    pub sink: Arc<MemorySink>,
}

pub struct HarnessBuilder {
    config: BroadcasterConfig,
    tokens: CountingTokens,
    delivery: ScriptedDelivery,
    users: FixedUsers,
    authorizer: FixedAuthorizer,
    retry: Option<RetryPolicy>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            tokens: CountingTokens::default(),
            delivery: ScriptedDelivery::new(),
            users: FixedUsers::anonymous(),
            authorizer: FixedAuthorizer::allow(),
            retry: None,
        }
    }

    pub fn config(mut self, config: BroadcasterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tokens(mut self, tokens: CountingTokens) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn delivery(mut self, delivery: ScriptedDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn users(mut self, users: FixedUsers) -> Self {
        self.users = users;
        self
    }

    pub fn authorizer(mut self, authorizer: FixedAuthorizer) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> Harness {
        let tokens = Arc::new(self.tokens);
        let delivery = Arc::new(self.delivery);
        let users = Arc::new(self.users);
        let authorizer = Arc::new(self.authorizer);
        let sink = Arc::new(MemorySink::new());

        let broadcaster = Broadcaster::from_parts(
            &self.config,
            Collaborators {
                tokens: tokens.clone(),
                delivery: delivery.clone(),
                users: users.clone(),
                authorizer: authorizer.clone(),
                sink: sink.clone(),
            },
        )
        .expect("valid harness config");
        let broadcaster = match self.retry {
            Some(retry) => broadcaster.with_retry_policy(retry),
            None => broadcaster,
        };

        Harness {
            broadcaster,
            tokens,
            delivery,
            users,
            authorizer,
            sink,
        }
    }
}
