//! Route definitions.
//!
//! Maps URLs to handlers with type-safe routing.

use super::{handlers::*, websocket::crash_ws_handler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check (high priority)
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        // Game plays
        .route("/api/dice/play", post(play_dice_handler))
        .route("/api/slots/play", post(play_slots_handler))
        // Crash round lifecycle
        .route("/api/crash/start", post(crash_start_handler))
        .route("/api/crash/:round_id", get(crash_snapshot_handler))
        .route("/api/crash/:round_id/cashout", post(crash_cashout_handler))
        .route("/ws/crash/:round_id", get(crash_ws_handler))
        // Accounts
        .route("/api/balance/:user_id", get(balance_handler))
        .route("/api/sessions/:user_id", get(sessions_handler))
        .route("/api/session/:session_id", get(session_handler))
        .route("/api/wallet/deposit", post(wallet_deposit_handler))
        .route("/api/wallet/withdraw", post(wallet_withdraw_handler))
        .route("/api/wallet/:user_id", get(wallet_history_handler))
        // Fairness verification
        .route("/api/verify", post(verify_handler))
        // Metrics endpoint for Prometheus
        .route("/metrics", get(metrics_handler))
        // Attach shared state
        .with_state(state)
}
