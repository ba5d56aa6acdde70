//! API request/response models.

use crate::games::types::{GameKind, GameSession};
use crate::ledger::WalletTransaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Service status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub node_id: String,
    pub version: String,
    /// House public key players verify fairness proofs against.
    pub fairness_public_key: String,
    pub active_crash_rounds: usize,
    pub server_time: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Account balance response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: f64,
}

/// Session list response, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsResponse {
    pub user_id: String,
    pub sessions: Vec<GameSession>,
}

/// Deposit or withdrawal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRequest {
    pub user_id: String,
    pub amount: f64,
}

/// Wallet history response, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletHistoryResponse {
    pub user_id: String,
    pub transactions: Vec<WalletTransaction>,
}

/// Request to verify a fairness proof tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub vrf_output: String,
    pub vrf_proof: String,
    pub public_key: String,
    pub input_message: String,
    pub client_seed: String,
    pub nonce: u64,
    pub game: GameKind,
}

/// Response from fairness verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Outcome values recomputed from the verified output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}
