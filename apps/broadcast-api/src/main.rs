use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use broadcast_api::config::Config;
use broadcast_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file; env vars may also be set externally
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("invalid configuration");
    let port = config.port;

    let kv = appsync_broadcast::kv::connect(&config.broadcaster.cache)
        .await
        .expect("failed to open cache store");

    tracing::info!(
        namespace = %config.broadcaster.namespace,
        app_id = %config.broadcaster.app_id,
        cache = %config.broadcaster.cache.driver,
        "broadcast-api configured"
    );

    let state = AppState::new(config, kv).expect("invalid configuration");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(broadcast_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "broadcast-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
