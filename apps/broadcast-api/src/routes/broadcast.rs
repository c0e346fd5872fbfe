//! Publish an event to one or more channels.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/broadcast", post(broadcast))
}

// ---------------------------------------------------------------------------
// POST /api/v1/broadcast
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    /// Channel names without the namespace, e.g. `private-orders.1`.
    pub channels: Vec<String>,
    pub event: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FailedChannel {
    pub channel: String,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BroadcastResponse {
    pub succeeded: usize,
    pub failures: Vec<FailedChannel>,
}

#[utoipa::path(
    post,
    path = "/api/v1/broadcast",
    tag = "Broadcasting",
    security(("bearer" = [])),
    request_body = BroadcastRequest,
    responses(
        (status = 200, description = "Delivered to at least one channel", body = BroadcastResponse),
        (status = 400, description = "Invalid request", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 502, description = "No channel could be reached", body = ApiErrorBody),
    ),
)]
pub async fn broadcast(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    validate(&body)?;

    tracing::debug!(
        user_id = %user.user_id,
        event = %body.event,
        channels = body.channels.len(),
        "broadcast requested"
    );

    let outcome = state
        .broadcaster
        .broadcast(&body.channels, &body.event, &body.data)
        .await?;

    Ok(Json(BroadcastResponse {
        succeeded: outcome.succeeded,
        failures: outcome
            .failures
            .into_iter()
            .map(|f| FailedChannel {
                channel: f.channel,
                error: f.error,
            })
            .collect(),
    }))
}

fn validate(body: &BroadcastRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if body.event.trim().is_empty() {
        errors.push(FieldError {
            field: "event".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if body.channels.is_empty() {
        errors.push(FieldError {
            field: "channels".to_string(),
            message: "at least one channel is required".to_string(),
        });
    }
    if body.channels.iter().any(|c| c.trim().is_empty()) {
        errors.push(FieldError {
            field: "channels".to_string(),
            message: "channel names must not be empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(errors))
    }
}
