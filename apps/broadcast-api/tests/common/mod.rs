#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appsync_broadcast::{BroadcasterConfig, KeyValueStore, MemoryStore};
use broadcast_api::auth::tokens::{self, TokenData};
use broadcast_api::config::Config;
use broadcast_api::AppState;

/// Token the mocked credential endpoint issues.
pub const GATEWAY_TOKEN: &str = "gateway-token";

/// Broadcaster configuration with both remote endpoints on `gateway`.
pub fn broadcaster_config(gateway: &MockServer) -> BroadcasterConfig {
    serde_json::from_value(json!({
        "namespace": "app",
        "app_id": "test-app",
        "region": "eu-west-1",
        "cache": { "driver": "memory", "prefix": "test:" },
        "options": {
            "cognito_pool": "pool",
            "cognito_region": "eu-west-1",
            "cognito_client_id": "client-id",
            "cognito_client_secret": "client-secret"
        },
        "endpoints": {
            "token_url": format!("{}/oauth2/token", gateway.uri()),
            "event_url": format!("{}/event", gateway.uri())
        }
    }))
    .expect("test broadcaster config")
}

/// Build a test AppState with an in-memory KV store.
pub fn test_state(gateway: &MockServer) -> AppState {
    let config = Config {
        port: 0,
        broadcaster: broadcaster_config(gateway),
    };
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    AppState::new(config, kv).expect("test state")
}

/// Build the full application router wired to the test state.
pub fn test_app(gateway: &MockServer) -> (Router, AppState) {
    let state = test_state(gateway);
    let app = broadcast_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Serve credentials from the mocked token endpoint.
pub async fn mount_token_endpoint(gateway: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": GATEWAY_TOKEN,
            "expires_in": 3600
        })))
        .mount(gateway)
        .await;
}

/// Answer every publish with `status`.
pub async fn mount_event_endpoint(gateway: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/event"))
        .respond_with(ResponseTemplate::new(status))
        .mount(gateway)
        .await;
}

/// Store a bearer token for a test user and return it.
pub async fn login_test_user(state: &AppState, user_id: &str, display_name: &str) -> String {
    let token = format!("tok_{user_id}");
    tokens::store_token(
        state.kv.as_ref(),
        &token,
        &TokenData {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
        },
    )
    .await
    .expect("store test token");
    token
}
