//! CityCare API
//!
//! Backend for a civic issue reporting service. Citizens report problems
//! (potholes, broken street lights, uncollected garbage) with a location and
//! photos or videos; staff move each report through its lifecycle.
//!
//! ## Components
//!
//! - **Issue lifecycle**: status, update history, resolution timestamps
//! - **User stats**: cached per-user report counters
//! - **Notifications**: bounded per-user inbox, filled on issue changes

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod lifecycle;
mod models;
mod notifications;
mod stats;
mod store;
mod uploads;
mod validation;

use axum::http::{HeaderValue, Method};
use handlers::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use store::{DisconnectedStore, PgStore, Store};
use tokio::fs;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "citycare=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        environment = ?config.environment,
        require_admin_role = config.require_admin_role,
        "Starting CityCare API"
    );

    // The store is created once; without it the API still answers
    let store: Arc<dyn Store> = match db::connect(config.database_url.as_deref()).await {
        Some(pool) => Arc::new(PgStore::new(pool)),
        None => Arc::new(DisconnectedStore),
    };

    let upload_dir = PathBuf::from(&config.upload_dir);
    fs::create_dir_all(&upload_dir).await?;
    tracing::info!("Upload directory: {:?}", upload_dir);

    let state = AppState {
        store,
        upload_dir,
        max_upload_size: config.max_upload_size,
        is_production: config.is_production(),
        require_admin_role: config.require_admin_role,
        admin_emails: Arc::new(config.admin_emails.clone()),
    };

    let cors = match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
                axum::http::HeaderName::from_static(auth::CLERK_USER_HEADER),
            ])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(origin = %config.frontend_url, "Invalid FRONTEND_URL, CORS disabled");
            CorsLayer::new()
        }
    };

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
