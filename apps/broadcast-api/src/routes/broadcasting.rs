//! Subscriber authentication for private and presence channels.

use appsync_broadcast::{AuthGrant, AuthRequest, AuthResponse};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::middleware::bearer_token;
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/broadcasting/auth", post(authenticate))
}

// ---------------------------------------------------------------------------
// POST /broadcasting/auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChannelAuthRequest {
    /// Fully-qualified channel name, e.g. `app/private-orders.1`.
    pub channel_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChannelAuthResponse {
    /// Gateway credential for guarded channels, `true` for public ones.
    #[schema(value_type = Object)]
    pub auth: Value,
    /// Present for presence channels only.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub channel_data: Option<Value>,
}

impl From<AuthResponse> for ChannelAuthResponse {
    fn from(response: AuthResponse) -> Self {
        let auth = match response.auth {
            AuthGrant::Credential(token) => Value::String(token),
            AuthGrant::Open(open) => Value::Bool(open),
        };
        let channel_data = response.channel_data.map(|data| {
            serde_json::json!({
                "user_id": data.user_id,
                "user_info": data.user_info,
            })
        });
        Self { auth, channel_data }
    }
}

#[utoipa::path(
    post,
    path = "/broadcasting/auth",
    tag = "Broadcasting",
    request_body = ChannelAuthRequest,
    responses(
        (status = 200, description = "Subscription authorized", body = ChannelAuthResponse),
        (status = 403, description = "Access denied", body = ApiErrorBody),
        (status = 502, description = "Gateway credential unavailable", body = ApiErrorBody),
    ),
)]
pub async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChannelAuthRequest>,
) -> Result<Json<ChannelAuthResponse>, ApiError> {
    let mut request = AuthRequest::new(body.channel_name);
    request.caller = bearer_token(&headers).map(str::to_string);

    let response = state.broadcaster.auth(&request).await?;
    Ok(Json(response.into()))
}
