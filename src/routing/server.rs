//! Server loop

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;

/// Serve a router with the standard middleware stack
///
/// Adds a health route, permissive CORS and HTTP tracing, then binds to the
/// configured address and runs until the process is stopped.
pub async fn run_server(
    config: &AppConfig,
    router: Router,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router
        .route("/health", get(health_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("streamchain listening on {}", addr);
    tracing::info!("LLM backend at {}", config.llm.base_url());

    Ok(axum::serve(listener, app).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}
