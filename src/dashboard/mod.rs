//! Dashboard — Axum web server exposing the ledger over JSON.
//!
//! Serves the core operations, queries and admin actions as a REST API.
//! CORS enabled for the companion web app.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use routes::{AppState, ADMIN_HEADER};

/// Bind the port and serve in a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(ADMIN_HEADER)]);

    Router::new()
        .route("/health", get(routes::health))
        // Queries
        .route("/api/stats", get(routes::get_stats))
        .route("/api/batch", get(routes::get_batch))
        .route("/api/users/:id", get(routes::get_user))
        .route("/api/users/:id/transactions", get(routes::get_transactions))
        // User operations
        .route("/api/users/:id/session", post(routes::start_session))
        .route("/api/users/:id/ads", post(routes::record_ad))
        .route("/api/users/:id/verification", post(routes::confirm_verification))
        .route("/api/users/:id/trading", post(routes::toggle_trading))
        .route("/api/users/:id/games/:game_id", post(routes::record_game_reward))
        .route("/api/referrals", post(routes::apply_referral))
        // Admin
        .route(
            "/api/admin/announcement",
            post(routes::begin_announcement)
                .put(routes::submit_announcement)
                .delete(routes::cancel_announcement),
        )
        .route("/api/admin/sync", post(routes::sync_all))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
