pub mod broadcast;
pub mod broadcasting;
pub mod health;

use axum::Router;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(broadcasting::router())
        .nest("/api/v1", broadcast::router())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        broadcasting::authenticate,
        broadcast::broadcast,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            health::HealthResponse,
            broadcasting::ChannelAuthRequest,
            broadcasting::ChannelAuthResponse,
            broadcast::BroadcastRequest,
            broadcast::BroadcastResponse,
            broadcast::FailedChannel,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Broadcasting", description = "Channel publishing and subscriber authentication"),
    )
)]
pub struct ApiDoc;
