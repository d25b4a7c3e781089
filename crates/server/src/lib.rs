//! Gallery Server Library
//!
//! Artwork sharing with accounts, image uploads, likes, and live like
//! counts pushed over WebSocket.

pub mod api;
pub mod core;
pub mod gallery;
pub mod pages;
pub mod realtime;

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::core::auth::middleware::mw_ctx_resolve;
use crate::core::auth::AuthManager;
use crate::core::{AppState, ServerConfig};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Install the global fmt subscriber. `RUST_LOG` wins over the mode default.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }
}

/// Build the full route table.
pub fn app(state: AppState) -> Router {
    let cors = if state.config.debug {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        // Home
        .route("/", get(pages::home))
        // /auth
        .merge(core::router())
        // /artworks, /gallery
        .merge(gallery::router())
        // /api/likes, /api/images
        .merge(api::router(state.config.max_image_bytes()))
        // Real-time channel
        .merge(realtime::router())
        // Health check
        .route("/health", get(health_check))
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), mw_ctx_resolve))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    info!("=== Gallery Server ===");
    info!(
        "Mode: {}",
        if config.debug { "debug" } else { "production" }
    );
    info!("Data directory: {:?}", config.layout.root());

    let state = AppState::init(config).await?;
    let port = state.config.port;

    spawn_session_purge(state.auth.clone());

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gallery server listening on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gallery server stopped");
    Ok(())
}

fn spawn_session_purge(auth: Arc<AuthManager>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = auth.purge_expired().await {
                warn!("[Auth] Session purge failed: {}", e);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_check() -> &'static str {
    "OK - Gallery Server"
}
