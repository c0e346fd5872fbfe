use appsync_broadcast::BroadcastError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// One offending input field, or one failed channel of a broadcast.
#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "BAD_GATEWAY", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            details: Some(details),
            ..Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Validation failed")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<BroadcastError> for ApiError {
    fn from(err: BroadcastError) -> Self {
        match err {
            BroadcastError::AccessDenied { channel } => {
                Self::forbidden(format!("Access denied to channel {channel}"))
            }
            BroadcastError::AggregateBroadcast { failures } => Self {
                details: Some(
                    failures
                        .into_iter()
                        .map(|f| FieldError {
                            field: f.channel,
                            message: f.error,
                        })
                        .collect(),
                ),
                ..Self::new(
                    StatusCode::BAD_GATEWAY,
                    "BROADCAST_FAILED",
                    "Broadcast could not be delivered",
                )
            },
            BroadcastError::Auth { .. }
            | BroadcastError::Unauthorized
            | BroadcastError::Transport(_)
            | BroadcastError::Gateway { .. } => {
                tracing::error!(?err, "gateway error");
                Self::bad_gateway("The realtime gateway is unavailable")
            }
            BroadcastError::Config { .. }
            | BroadcastError::Cache(_)
            | BroadcastError::Serialization(_) => {
                tracing::error!(?err, "broadcaster error");
                Self::internal("An internal error occurred")
            }
        }
    }
}
