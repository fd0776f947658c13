//! PageMix API Server
//!
//! Provides REST endpoints for:
//! - Uploading PDF/DOCX documents with page thumbnails
//! - Merging selected pages from uploaded documents into one PDF

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod config;
mod error;
mod handlers;
mod models;
mod state;

use config::ServerConfig;
use state::AppState;

/// Room for multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pagemix_api=info".parse()?)
                .add_directive("pagemix_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Initializing PageMix API...");
    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::new(&config)?);

    pagemix_core::spawn_sweeper(
        Arc::clone(&state.store),
        config.pipeline.sweep_interval,
        config.pipeline.retention_ttl,
    );

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting PageMix API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let body_limit = state
        .pipeline()
        .max_upload_size
        .saturating_add(MULTIPART_OVERHEAD);

    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::upload))
        .route("/merge", post(handlers::merge))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
