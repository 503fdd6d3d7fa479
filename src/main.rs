//! Credit report assistant
//!
//! A backend that lets a user upload a credit report or bank statement, ask
//! questions about it, and draft and send a dispute email when something in
//! it is wrong.

mod api;
mod conversation;
mod dispute;
mod document;
mod error;
mod intent;
mod runtime;
mod services;
mod state_machine;

use api::{create_router, AppState, ServerConfig};
use axum::extract::DefaultBodyLimit;
use runtime::{Collaborators, SessionManager};
use services::{HttpServices, ServiceConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_rep_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let server_config = ServerConfig::from_env();
    let service_config = ServiceConfig::from_env();
    tracing::info!(
        base_url = %service_config.base_url,
        timeout_secs = service_config.request_timeout.as_secs(),
        "Using collaborator services"
    );

    // One HTTP client shared by every session
    let services = Arc::new(HttpServices::new(&service_config)?);
    let collaborators = Collaborators {
        parser: services.clone(),
        chat: services.clone(),
        email: services,
    };

    match &server_config.custom_keywords {
        Some(keywords) => tracing::info!(
            keywords = ?keywords.keywords().collect::<Vec<_>>(),
            "Using custom dispute keywords"
        ),
        None => tracing::info!("Using default dispute keywords"),
    }
    let sessions = Arc::new(SessionManager::new(
        collaborators,
        server_config.classifier(),
    ));
    sessions.start_idle_sweeper(server_config.session_idle_timeout);
    let state = AppState::new(sessions, server_config.max_upload_bytes());

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(DefaultBodyLimit::max(server_config.max_body_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!("Credit report assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
