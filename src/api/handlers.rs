//! Request handlers.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::fairness::{self, FairnessEngine, FairnessProof};
use crate::games::crash::{CrashSnapshot, CrashState};
use crate::games::types::{
    CrashStartRequest, DicePlayRequest, GameKind, GameSession, OutcomeData, SlotsPlayRequest,
    SLOT_SYMBOLS,
};
use crate::games::GameService;
use crate::metrics::MetricsRegistry;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state.
pub struct AppState {
    pub service: Arc<GameService>,
    pub metrics: Arc<MetricsRegistry>,
    pub node_id: String,
    pub version: String,
    pub started_at: Instant,
}

/// Health check handler - minimal response time.
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
    })
}

/// Service status, including the house fairness public key.
/// GET /status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        node_id: state.node_id.clone(),
        version: state.version.clone(),
        fairness_public_key: state.service.fairness_public_key(),
        active_crash_rounds: state.service.crash.active_rounds(),
        server_time: chrono::Utc::now(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// Play one dice round.
/// POST /api/dice/play
pub async fn play_dice_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<DicePlayRequest>,
) -> Result<Json<GameSession>, ApiError> {
    state
        .service
        .play_dice(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(request_id.0, e))
}

/// Play one slots round.
/// POST /api/slots/play
pub async fn play_slots_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SlotsPlayRequest>,
) -> Result<Json<GameSession>, ApiError> {
    state
        .service
        .play_slots(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(request_id.0, e))
}

/// Place a crash bet and start the round.
/// POST /api/crash/start
pub async fn crash_start_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CrashStartRequest>,
) -> Result<Json<CrashSnapshot>, ApiError> {
    state
        .service
        .crash
        .start_round(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(request_id.0, e))
}

/// Cash out of a running crash round.
/// POST /api/crash/:round_id/cashout
pub async fn crash_cashout_handler(
    Extension(request_id): Extension<RequestId>,
    Path(round_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<GameSession>, ApiError> {
    state
        .service
        .crash
        .cash_out(&round_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(request_id.0, e))
}

/// Current view of a crash round, live or settled.
/// GET /api/crash/:round_id
pub async fn crash_snapshot_handler(
    Extension(request_id): Extension<RequestId>,
    Path(round_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<CrashSnapshot>, ApiError> {
    if let Some(snapshot) = state.service.crash.snapshot(&round_id) {
        return Ok(Json(snapshot));
    }

    // Not live: the round may already be settled.
    let session = state
        .service
        .ledger()
        .session_by_id(&round_id)
        .await
        .filter(|s| s.kind == GameKind::Crash)
        .ok_or_else(|| {
            ApiError::not_found(request_id.0.clone(), format!("Crash round {} not found", round_id))
        })?;

    Ok(Json(settled_snapshot(&session)))
}

/// Rebuild a terminal snapshot from a settled session record.
fn settled_snapshot(session: &GameSession) -> CrashSnapshot {
    let (crash_point, cashed_out_at) = match session.outcome_data {
        OutcomeData::Crash { crash_point, cashed_out_at } => (crash_point, cashed_out_at),
        _ => (0.0, None),
    };
    CrashSnapshot {
        round_id: session.id.clone(),
        state: if cashed_out_at.is_some() {
            CrashState::CashedOut
        } else {
            CrashState::Crashed
        },
        multiplier: cashed_out_at.unwrap_or(crash_point),
        crash_point: Some(crash_point),
        payout: Some(session.payout),
    }
}

/// Account balance.
/// GET /api/balance/:user_id
pub async fn balance_handler(
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .service
        .ledger()
        .balance(&user_id)
        .await
        .map_err(|e| ApiError::from_service(request_id.0, e.into()))?;

    Ok(Json(BalanceResponse { user_id, balance }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Recent game sessions for an account.
/// GET /api/sessions/:user_id?limit={n}
pub async fn sessions_handler(
    Path(user_id): Path<String>,
    Query(params): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<SessionsResponse> {
    let limit = params.limit.min(500);
    let sessions = state.service.ledger().sessions(&user_id, limit).await;
    Json(SessionsResponse { user_id, sessions })
}

/// Look up one settled session by id.
/// GET /api/session/:session_id
pub async fn session_handler(
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<GameSession>, ApiError> {
    state
        .service
        .ledger()
        .session_by_id(&session_id)
        .await
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(request_id.0, format!("Session {} not found", session_id))
        })
}

/// Credit an account, creating it on first deposit.
/// POST /api/wallet/deposit
pub async fn wallet_deposit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<WalletRequest>,
) -> Result<Json<crate::ledger::WalletTransaction>, ApiError> {
    state
        .service
        .ledger()
        .deposit(&request.user_id, request.amount)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(request_id.0, e.into()))
}

/// Debit an account.
/// POST /api/wallet/withdraw
pub async fn wallet_withdraw_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<WalletRequest>,
) -> Result<Json<crate::ledger::WalletTransaction>, ApiError> {
    state
        .service
        .ledger()
        .withdraw(&request.user_id, request.amount)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(request_id.0, e.into()))
}

/// Wallet movement history for an account.
/// GET /api/wallet/:user_id?limit={n}
pub async fn wallet_history_handler(
    Path(user_id): Path<String>,
    Query(params): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Json<WalletHistoryResponse> {
    let limit = params.limit.min(500);
    let transactions = state
        .service
        .ledger()
        .wallet_transactions(&user_id, limit)
        .await;
    Json(WalletHistoryResponse { user_id, transactions })
}

/// Verify a fairness proof tuple and recompute the outcome it fixes.
/// POST /api/verify
pub async fn verify_handler(
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let proof = FairnessProof {
        vrf_output: request.vrf_output.clone(),
        vrf_proof: request.vrf_proof,
        public_key: request.public_key,
        input_message: request.input_message,
        client_seed: request.client_seed,
        nonce: request.nonce,
    };

    let is_valid = match FairnessEngine::verify_proof(&proof) {
        Ok(valid) => valid,
        Err(e) => {
            return Ok(Json(VerifyResponse {
                is_valid: false,
                error: Some(e.to_string()),
                computed_result: None,
                explanation: None,
            }))
        }
    };

    if !is_valid {
        return Ok(Json(VerifyResponse {
            is_valid: false,
            error: Some("Proof verification failed".to_string()),
            computed_result: None,
            explanation: None,
        }));
    }

    // The proof holds, so the digest is authentic: recompute the outcome
    // the player was dealt.
    let digest: [u8; 32] = hex::decode(&request.vrf_output)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            ApiError::bad_request(
                request_id.0,
                "vrf_output must be 32 hex-encoded bytes".to_string(),
            )
        })?;

    let computed = match request.game {
        GameKind::Dice => fairness::dice_roll(&digest)
            .map(|roll| serde_json::json!({ "roll": roll })),
        GameKind::Slots => fairness::reel_indices(&digest, SLOT_SYMBOLS.len()).map(|reels| {
            serde_json::json!({
                "reels": reels,
                "symbols": reels.map(|i| SLOT_SYMBOLS[i].name),
            })
        }),
        GameKind::Crash => fairness::crash_point(&digest)
            .map(|point| serde_json::json!({ "crash_point": point })),
    };

    match computed {
        Ok(result) => Ok(Json(VerifyResponse {
            is_valid: true,
            error: None,
            computed_result: Some(result),
            explanation: Some(
                "Signature and output digest verified; outcome recomputed from the output."
                    .to_string(),
            ),
        })),
        Err(e) => Ok(Json(VerifyResponse {
            is_valid: false,
            error: Some(e.to_string()),
            computed_result: None,
            explanation: None,
        })),
    }
}

/// Prometheus metrics endpoint.
/// GET /metrics
pub async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> axum::response::Response<String> {
    axum::response::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
        .body(state.metrics.to_prometheus_format())
        .unwrap_or_default()
}
