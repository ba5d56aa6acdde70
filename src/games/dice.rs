//! Dice engine: roll-under threshold game.
//!
//! A single draw in [0, 100] is compared against a player-chosen target in
//! [2, 95]. A roll strictly below the target wins and pays
//! `stake * house_factor / target`; the strict comparison is what realizes
//! the stated house edge, so it must never become `<=`.

use crate::config::GamesConfig;
use crate::errors::GameError;
use crate::games::types::GameOutcome;

/// Result of evaluating one dice play.
#[derive(Debug, Clone, PartialEq)]
pub struct DicePlay {
    pub roll: u8,
    pub target: u8,
    pub outcome: GameOutcome,
    pub multiplier: f64,
    pub payout: f64,
}

/// Dice game engine. Holds only payout parameters; the roll itself comes
/// from the fairness provider.
#[derive(Debug, Clone)]
pub struct DiceEngine {
    house_factor: f64,
    target_min: u8,
    target_max: u8,
    min_bet: f64,
    max_bet: f64,
}

impl DiceEngine {
    pub fn new(config: &GamesConfig) -> Self {
        Self {
            house_factor: config.house_factor,
            target_min: config.dice_target_min,
            target_max: config.dice_target_max,
            min_bet: config.min_bet,
            max_bet: config.max_bet,
        }
    }

    /// Validate a bet before any draw happens.
    pub fn validate(&self, stake: f64, target: u8) -> Result<(), GameError> {
        validate_stake(stake, self.min_bet, self.max_bet)?;
        if target < self.target_min || target > self.target_max {
            return Err(GameError::InvalidTarget {
                target,
                min: self.target_min,
                max: self.target_max,
            });
        }
        Ok(())
    }

    /// Evaluate a validated play against a drawn roll.
    pub fn evaluate(&self, stake: f64, target: u8, roll: u8) -> DicePlay {
        // Strictly less than: a roll equal to the target loses.
        let win = roll < target;
        let multiplier = self.house_factor / target as f64;
        let payout = if win { stake * multiplier } else { 0.0 };

        DicePlay {
            roll,
            target,
            outcome: if win { GameOutcome::Win } else { GameOutcome::Loss },
            multiplier: if win { multiplier } else { 0.0 },
            payout,
        }
    }

    /// Win probability for a given target, for display purposes.
    pub fn win_chance(&self, target: u8) -> f64 {
        target as f64 / 101.0
    }
}

pub(crate) fn validate_stake(stake: f64, min_bet: f64, max_bet: f64) -> Result<(), GameError> {
    if !stake.is_finite() || stake <= 0.0 {
        return Err(GameError::InvalidStake { stake });
    }
    if stake < min_bet || stake > max_bet {
        return Err(GameError::StakeOutOfRange {
            stake,
            min: min_bet,
            max: max_bet,
        });
    }
    Ok(())
}
