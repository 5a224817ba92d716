//! HTTP Gateway
//!
//! ```text
//! /api/v1/health                  public
//! /api/v1/transactions/transfer   POST, bearer token, Idempotency-Key
//! /api/v1/transactions            GET, bearer token
//! /docs                           Swagger UI
//! ```

pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
use state::AppState;

/// All routes with state applied
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let private_routes = Router::new()
        .route("/transactions/transfer", post(handlers::create_transfer))
        .route("/transactions", get(handlers::get_history))
        .route_layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    Router::new()
        .nest("/api/v1", public_routes.merge(private_routes))
        .with_state(state)
        // Stateless, added after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Serve on an already bound listener until Ctrl-C
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

/// Bind `host:port` and serve
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {} (port in use?)", addr, e))?;

    tracing::info!(
        addr = %addr,
        store = state.store_name,
        "Gateway listening, API docs at http://{}/docs",
        addr
    );

    serve(listener, state).await?;
    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
