//! Broadcasting adapter for an AppSync Events style real-time gateway.
//!
//! [`Broadcaster`] publishes application events to namespaced channels over
//! HTTPS and issues gateway credentials to subscribers of private and
//! presence channels.

pub mod broadcaster;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod delivery;
pub mod envelope;
pub mod error;
pub mod kv;
pub mod observe;
pub mod retry;

pub use broadcaster::{
    Access, AuthGrant, AuthRequest, AuthResponse, Broadcaster, ChannelAuthorizer, Collaborators,
    Identity, PresenceData, UserResolver,
};
pub use channel::{ChannelClassifier, ChannelKind};
pub use config::{BroadcasterConfig, FailurePolicy};
pub use credentials::{CredentialCache, TokenProvider};
pub use delivery::{AppSyncDelivery, EventDelivery};
pub use envelope::{BroadcastEnvelope, BroadcastOutcome, ChannelFailure};
pub use error::{BroadcastError, Result};
pub use kv::{KeyValueStore, MemoryStore, RedisStore};
pub use observe::{BroadcastEvent, EventSink, MemorySink, TracingSink};
pub use retry::RetryPolicy;
