use crate::fairness::FairnessProof;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported game kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Dice,
    Slots,
    Crash,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Dice => write!(f, "dice"),
            GameKind::Slots => write!(f, "slots"),
            GameKind::Crash => write!(f, "crash"),
        }
    }
}

/// Win/lose decision for a play.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameOutcome {
    Win,
    Loss,
}

/// One slot symbol with its three-of-a-kind payout multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotSymbol {
    pub name: &'static str,
    pub multiplier: f64,
}

/// Reel symbol table, ordered by increasing value.
pub const SLOT_SYMBOLS: [SlotSymbol; 5] = [
    SlotSymbol { name: "Cherry", multiplier: 2.0 },
    SlotSymbol { name: "Grape", multiplier: 3.0 },
    SlotSymbol { name: "Gem", multiplier: 4.0 },
    SlotSymbol { name: "Apple", multiplier: 5.0 },
    SlotSymbol { name: "Diamond", multiplier: 10.0 },
];

/// Game-specific outcome data (discriminated union).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum OutcomeData {
    Dice {
        roll: u8,
        target: u8,
    },
    Slots {
        reels: [usize; 3],
    },
    Crash {
        crash_point: f64,
        /// Multiplier at the accepted cash-out, `None` when the round crashed.
        cashed_out_at: Option<f64>,
    },
}

/// One completed play. Write-once: created and finalized in a single
/// settlement step, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub id: String,
    pub user_id: String,
    pub kind: GameKind,
    pub stake: f64,
    pub outcome: GameOutcome,
    pub outcome_data: OutcomeData,
    pub payout: f64,
    pub fairness: FairnessProof,
    pub settled_at: u64,
}

/// Request to play a dice round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DicePlayRequest {
    pub user_id: String,
    pub stake: f64,
    /// Roll-under target: a roll strictly below this wins.
    pub target: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_seed: Option<String>,
}

/// Request to play a slots round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotsPlayRequest {
    pub user_id: String,
    pub stake: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_seed: Option<String>,
}

/// Request to place a crash bet and start the round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashStartRequest {
    pub user_id: String,
    pub stake: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_seed: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_kind_display_matches_serde() {
        assert_eq!(GameKind::Dice.to_string(), "dice");
        assert_eq!(GameKind::Slots.to_string(), "slots");
        assert_eq!(GameKind::Crash.to_string(), "crash");
        assert_eq!(serde_json::to_string(&GameKind::Crash).unwrap(), "\"crash\"");
    }

    #[test]
    fn test_symbol_table_ordered_by_value() {
        for pair in SLOT_SYMBOLS.windows(2) {
            assert!(pair[0].multiplier < pair[1].multiplier);
        }
    }

    #[test]
    fn test_outcome_data_serialization_tagged() {
        let data = OutcomeData::Dice { roll: 30, target: 50 };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"game\":\"dice\""));
        assert!(json.contains("\"roll\":30"));
    }
}
