//! Error types for the stakehouse game service.

use thiserror::Error;

/// Root error type for all stakehouse operations.
#[derive(Debug, Error)]
pub enum StakehouseError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Crash(#[from] CrashError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Fairness(#[from] FairnessError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Bet validation errors. Rejected before any draw or state mutation.
#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("Invalid stake {stake}: must be positive and finite")]
    InvalidStake { stake: f64 },

    #[error("Stake {stake} outside allowed range [{min}, {max}]")]
    StakeOutOfRange { stake: f64, min: f64, max: f64 },

    #[error("Invalid dice target {target}: must be in [{min}, {max}]")]
    InvalidTarget { target: u8, min: u8, max: u8 },
}

/// Crash round state machine errors.
#[derive(Debug, Error, PartialEq)]
pub enum CrashError {
    #[error("Round {0} not found (never started or already settled)")]
    RoundNotFound(String),

    #[error("Round is not running (state: {state})")]
    RoundNotRunning { state: String },

    #[error("Cash-out too late: multiplier already reached the crash point")]
    TooLate,

    #[error("Invalid transition: {from} -> {attempted}")]
    InvalidTransition {
        from: &'static str,
        attempted: &'static str,
    },

    #[error("Round worker stopped before replying")]
    WorkerGone,
}

/// Ledger and wallet errors.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Invalid amount {0}: must be positive and finite")]
    InvalidAmount(f64),

    #[error("Invalid payout {0}: must be non-negative and finite")]
    InvalidPayout(f64),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),
}

/// Fairness provider errors. Out-of-range draws are fatal to the round and
/// must abort without settling.
#[derive(Debug, Error, PartialEq)]
pub enum FairnessError {
    #[error("Draw out of declared range for {kind}: {value}")]
    OutOfRange { kind: &'static str, value: String },

    #[error("Invalid proof encoding: {0}")]
    Malformed(String),

    #[error("Proof verification failed: {0}")]
    Verification(String),
}

/// Convenience type alias for Results.
pub type StakehouseResult<T> = Result<T, StakehouseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::InsufficientFunds {
            required: 50.0,
            available: 10.0,
        };
        assert!(err.to_string().contains("need 50"));
        assert!(err.to_string().contains("have 10"));
    }

    #[test]
    fn test_error_conversion() {
        let err: StakehouseError = GameError::InvalidTarget {
            target: 99,
            min: 2,
            max: 95,
        }
        .into();
        match err {
            StakehouseError::Game(_) => {}
            _ => panic!("Expected game error"),
        }
    }
}
