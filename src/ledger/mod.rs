//! Settlement and balance ledger.
//!
//! The one piece of shared mutable state in the service is the per-account
//! balance. Only the ledger writes it, always as
//! `balance' = balance - stake + payout`, and always under per-account
//! exclusive access so two settlements can never read the same stale balance
//! ("lost update"). Settlements are idempotent: replaying a settlement key
//! returns the recorded session without re-applying the delta.

use crate::config::LedgerConfig;
use crate::errors::LedgerError;
use crate::fairness::FairnessProof;
use crate::games::types::{GameKind, GameOutcome, GameSession, OutcomeData};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Input to one settlement. The settlement key doubles as the session id
/// and as the idempotency token.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub settlement_key: String,
    pub user_id: String,
    pub kind: GameKind,
    pub stake: f64,
    pub payout: f64,
    pub outcome: GameOutcome,
    pub outcome_data: OutcomeData,
    pub fairness: FairnessProof,
}

/// Wallet movement direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Deposit,
    Withdraw,
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletKind::Deposit => write!(f, "deposit"),
            WalletKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// One deposit or withdrawal, applied immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: String,
    pub kind: WalletKind,
    pub amount: f64,
    pub balance_after: f64,
    pub created_at: u64,
}

/// Storage contract for balances and session records.
///
/// Implementations must apply `settle` atomically per user: the balance
/// check, the balance write, and the session insert happen as one unit, or
/// are reconciled on partial failure. A half-applied settlement (debited
/// balance without a session record, or the reverse) is never observable.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance. Errors for accounts that never deposited.
    async fn balance(&self, user_id: &str) -> Result<f64, LedgerError>;

    /// Next fairness nonce for the account, strictly increasing.
    async fn next_nonce(&self, user_id: &str) -> Result<u64, LedgerError>;

    /// Apply one settlement; idempotent under settlement-key replay.
    async fn settle(&self, request: SettlementRequest) -> Result<GameSession, LedgerError>;

    /// Credit the account, creating it on first deposit.
    async fn deposit(&self, user_id: &str, amount: f64) -> Result<WalletTransaction, LedgerError>;

    /// Debit the account; rejected when it would go negative.
    async fn withdraw(&self, user_id: &str, amount: f64) -> Result<WalletTransaction, LedgerError>;

    /// Recent sessions for an account, newest first.
    async fn sessions(&self, user_id: &str, limit: usize) -> Vec<GameSession>;

    /// Look up a settled session by id.
    async fn session_by_id(&self, session_id: &str) -> Option<GameSession>;

    /// Recent wallet movements for an account, newest first.
    async fn wallet_transactions(&self, user_id: &str, limit: usize) -> Vec<WalletTransaction>;
}

#[derive(Debug, Default)]
struct Account {
    balance: f64,
    nonce: u64,
    sessions: Vec<GameSession>,
    wallet: Vec<WalletTransaction>,
    /// Settlement key -> recorded session, for idempotent replay. Survives
    /// session-list trimming.
    applied: HashMap<String, GameSession>,
}

/// In-process ledger backed by `DashMap`. Entry locking gives the per-user
/// serialization point the trait requires.
pub struct MemoryLedger {
    config: LedgerConfig,
    accounts: DashMap<String, Account>,
    sessions_by_id: DashMap<String, GameSession>,
}

impl MemoryLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            accounts: DashMap::new(),
            sessions_by_id: DashMap::new(),
        }
    }

    fn validate_amount(amount: f64) -> Result<(), LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn balance(&self, user_id: &str) -> Result<f64, LedgerError> {
        self.accounts
            .get(user_id)
            .map(|account| account.balance)
            .ok_or_else(|| LedgerError::UnknownAccount(user_id.to_string()))
    }

    async fn next_nonce(&self, user_id: &str) -> Result<u64, LedgerError> {
        let mut account = self
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::UnknownAccount(user_id.to_string()))?;
        account.nonce += 1;
        Ok(account.nonce)
    }

    async fn settle(&self, request: SettlementRequest) -> Result<GameSession, LedgerError> {
        Self::validate_amount(request.stake)?;
        if !request.payout.is_finite() || request.payout < 0.0 {
            return Err(LedgerError::InvalidPayout(request.payout));
        }

        let session = {
            let mut account = self
                .accounts
                .get_mut(&request.user_id)
                .ok_or_else(|| LedgerError::UnknownAccount(request.user_id.clone()))?;

            // Idempotent replay: the key was already applied, return the
            // recorded session untouched.
            if let Some(existing) = account.applied.get(&request.settlement_key) {
                return Ok(existing.clone());
            }

            // Re-check funds at the serialization point, not just at bet
            // acceptance: another settlement may have run since.
            if account.balance < request.stake {
                return Err(LedgerError::InsufficientFunds {
                    required: request.stake,
                    available: account.balance,
                });
            }

            account.balance = account.balance - request.stake + request.payout;

            let session = GameSession {
                id: request.settlement_key.clone(),
                user_id: request.user_id.clone(),
                kind: request.kind,
                stake: request.stake,
                outcome: request.outcome,
                outcome_data: request.outcome_data,
                payout: request.payout,
                fairness: request.fairness,
                settled_at: unix_now(),
            };

            account.sessions.push(session.clone());
            if account.sessions.len() > self.config.max_sessions_per_account {
                account.sessions.remove(0);
            }
            account
                .applied
                .insert(request.settlement_key.clone(), session.clone());

            session
        };

        // Secondary index, populated outside the account lock.
        self.sessions_by_id
            .insert(session.id.clone(), session.clone());

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            kind = %session.kind,
            stake = session.stake,
            payout = session.payout,
            "settled game session"
        );

        Ok(session)
    }

    async fn deposit(&self, user_id: &str, amount: f64) -> Result<WalletTransaction, LedgerError> {
        Self::validate_amount(amount)?;

        let mut account = self
            .accounts
            .entry(user_id.to_string())
            .or_insert_with(|| Account {
                balance: self.config.starting_balance,
                ..Default::default()
            });

        account.balance += amount;
        let tx = WalletTransaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: WalletKind::Deposit,
            amount,
            balance_after: account.balance,
            created_at: unix_now(),
        };
        account.wallet.push(tx.clone());
        Ok(tx)
    }

    async fn withdraw(&self, user_id: &str, amount: f64) -> Result<WalletTransaction, LedgerError> {
        Self::validate_amount(amount)?;

        let mut account = self
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| LedgerError::UnknownAccount(user_id.to_string()))?;

        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: account.balance,
            });
        }

        account.balance -= amount;
        let tx = WalletTransaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind: WalletKind::Withdraw,
            amount,
            balance_after: account.balance,
            created_at: unix_now(),
        };
        account.wallet.push(tx.clone());
        Ok(tx)
    }

    async fn sessions(&self, user_id: &str, limit: usize) -> Vec<GameSession> {
        self.accounts
            .get(user_id)
            .map(|account| account.sessions.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    async fn session_by_id(&self, session_id: &str) -> Option<GameSession> {
        self.sessions_by_id.get(session_id).map(|s| s.clone())
    }

    async fn wallet_transactions(&self, user_id: &str, limit: usize) -> Vec<WalletTransaction> {
        self.accounts
            .get(user_id)
            .map(|account| account.wallet.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fairness::FairnessProof;
    use std::sync::Arc;

    fn proof() -> FairnessProof {
        FairnessProof {
            vrf_output: "00".repeat(32),
            vrf_proof: "00".repeat(64),
            public_key: "00".repeat(32),
            input_message: "test".to_string(),
            client_seed: "seed".to_string(),
            nonce: 1,
        }
    }

    fn settlement(user_id: &str, key: &str, stake: f64, payout: f64) -> SettlementRequest {
        SettlementRequest {
            settlement_key: key.to_string(),
            user_id: user_id.to_string(),
            kind: GameKind::Dice,
            stake,
            payout,
            outcome: if payout > 0.0 { GameOutcome::Win } else { GameOutcome::Loss },
            outcome_data: OutcomeData::Dice { roll: 30, target: 50 },
            fairness: proof(),
        }
    }

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(LedgerConfig::default())
    }

    #[tokio::test]
    async fn test_settlement_applies_exact_delta() {
        let ledger = ledger();
        ledger.deposit("alice", 100.0).await.unwrap();

        // Win: new = 100 - 10 + 19.80
        ledger.settle(settlement("alice", "s1", 10.0, 19.80)).await.unwrap();
        assert!((ledger.balance("alice").await.unwrap() - 109.80).abs() < 1e-9);

        // Loss: new = 109.80 - 10
        ledger.settle(settlement("alice", "s2", 10.0, 0.0)).await.unwrap();
        assert!((ledger.balance("alice").await.unwrap() - 99.80).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_insufficient_funds_rejected_without_mutation() {
        let ledger = ledger();
        ledger.deposit("bob", 5.0).await.unwrap();

        let err = ledger.settle(settlement("bob", "s1", 10.0, 0.0)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance("bob").await.unwrap(), 5.0);
        assert!(ledger.sessions("bob", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_settlement_replay_does_not_double_apply() {
        let ledger = ledger();
        ledger.deposit("carol", 100.0).await.unwrap();

        let first = ledger.settle(settlement("carol", "s1", 10.0, 20.0)).await.unwrap();
        let replay = ledger.settle(settlement("carol", "s1", 10.0, 20.0)).await.unwrap();

        assert_eq!(first.id, replay.id);
        assert_eq!(first.settled_at, replay.settled_at);
        assert!((ledger.balance("carol").await.unwrap() - 110.0).abs() < 1e-9);
        assert_eq!(ledger.sessions("carol", 10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_settlements_serialize() {
        let ledger = Arc::new(ledger());
        ledger.deposit("dave", 1_000.0).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .settle(settlement("dave", &format!("s{}", i), 10.0, 5.0))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Every settlement nets -5; no lost updates.
        assert!((ledger.balance("dave").await.unwrap() - (1_000.0 - 50.0 * 5.0)).abs() < 1e-9);
        assert_eq!(ledger.sessions("dave", 100).await.len(), 50);
    }

    #[tokio::test]
    async fn test_balance_never_goes_negative_under_contention() {
        let ledger = Arc::new(ledger());
        ledger.deposit("erin", 25.0).await.unwrap();

        // Only two of these loss settlements can fit the balance.
        let mut handles = Vec::new();
        for i in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.settle(settlement("erin", &format!("s{}", i), 10.0, 0.0)).await
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                applied += 1;
            }
        }

        assert_eq!(applied, 2);
        assert!(ledger.balance("erin").await.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_withdraw_validates_funds() {
        let ledger = ledger();
        ledger.deposit("frank", 50.0).await.unwrap();

        ledger.withdraw("frank", 30.0).await.unwrap();
        assert!((ledger.balance("frank").await.unwrap() - 20.0).abs() < 1e-9);

        let err = ledger.withdraw("frank", 30.0).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_unknown_account_errors() {
        let ledger = ledger();
        assert!(matches!(
            ledger.balance("ghost").await.unwrap_err(),
            LedgerError::UnknownAccount(_)
        ));
        assert!(matches!(
            ledger.withdraw("ghost", 5.0).await.unwrap_err(),
            LedgerError::UnknownAccount(_)
        ));
    }

    #[tokio::test]
    async fn test_nonce_strictly_increases() {
        let ledger = ledger();
        ledger.deposit("gail", 10.0).await.unwrap();
        let a = ledger.next_nonce("gail").await.unwrap();
        let b = ledger.next_nonce("gail").await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() {
        let ledger = ledger();
        assert!(ledger.deposit("hank", 0.0).await.is_err());
        assert!(ledger.deposit("hank", -1.0).await.is_err());
        assert!(ledger.deposit("hank", f64::INFINITY).await.is_err());
    }

    #[tokio::test]
    async fn test_session_lookup_by_id() {
        let ledger = ledger();
        ledger.deposit("iris", 100.0).await.unwrap();
        ledger.settle(settlement("iris", "round-9", 10.0, 0.0)).await.unwrap();

        let session = ledger.session_by_id("round-9").await.unwrap();
        assert_eq!(session.user_id, "iris");
        assert!(ledger.session_by_id("missing").await.is_none());
    }
}
