//! Outbound publishing to the gateway's event endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::RwLock;

use crate::credentials::TokenProvider;
use crate::envelope::{BroadcastEnvelope, PublishRequest};
use crate::error::{BroadcastError, Result};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Publishes one envelope to one fully-qualified channel.
///
/// Implementations report a 401 as [`BroadcastError::Unauthorized`], a missing
/// response as [`BroadcastError::Transport`] and any other non-2xx as
/// [`BroadcastError::Gateway`].
#[async_trait]
pub trait EventDelivery: Send + Sync {
    async fn send(&self, channel: &str, envelope: &BroadcastEnvelope) -> Result<()>;

    /// Drop any connection state built with a credential that has since been
    /// rejected.
    async fn reset(&self) {}
}

pub struct AppSyncDelivery {
    event_url: String,
    tokens: Arc<dyn TokenProvider>,
    client: RwLock<Option<reqwest::Client>>,
}

impl AppSyncDelivery {
    pub fn new(event_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            event_url: event_url.into(),
            tokens,
            client: RwLock::new(None),
        }
    }

    /// The HTTP client, built on first use.
    async fn client(&self) -> Result<reqwest::Client> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.client.write().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;
        *slot = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl EventDelivery for AppSyncDelivery {
    async fn send(&self, channel: &str, envelope: &BroadcastEnvelope) -> Result<()> {
        let token = self.tokens.get_token().await?;
        let body = PublishRequest::single(channel, envelope)?;
        let client = self.client().await?;

        let response = client
            .post(&self.event_url)
            .header(AUTHORIZATION, token)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(?e, %channel, "gateway request failed");
                BroadcastError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(BroadcastError::Unauthorized);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        Err(BroadcastError::Gateway {
            status: status.as_u16(),
            body,
        })
    }

    async fn reset(&self) {
        *self.client.write().await = None;
    }
}
