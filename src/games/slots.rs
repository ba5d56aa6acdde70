//! Slots engine: three-reel draw with tiered payouts.

use crate::config::GamesConfig;
use crate::errors::GameError;
use crate::games::dice::validate_stake;
use crate::games::types::{GameOutcome, SlotSymbol, SLOT_SYMBOLS};

/// Result of evaluating one spin.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotsPlay {
    pub reels: [usize; 3],
    pub tier: PayoutTier,
    pub outcome: GameOutcome,
    pub payout: f64,
}

/// Exactly one tier applies to every spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutTier {
    /// All three reels identical: full symbol multiplier.
    ThreeOfAKind,
    /// Exactly two reels identical: half the matching symbol's multiplier.
    TwoOfAKind,
    NoMatch,
}

/// Slots game engine over a fixed symbol table.
#[derive(Debug, Clone)]
pub struct SlotsEngine {
    symbols: &'static [SlotSymbol],
    min_bet: f64,
    max_bet: f64,
}

impl SlotsEngine {
    pub fn new(config: &GamesConfig) -> Self {
        Self {
            symbols: &SLOT_SYMBOLS,
            min_bet: config.min_bet,
            max_bet: config.max_bet,
        }
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbol(&self, index: usize) -> Option<&'static SlotSymbol> {
        self.symbols.get(index)
    }

    pub fn validate(&self, stake: f64) -> Result<(), GameError> {
        validate_stake(stake, self.min_bet, self.max_bet)
    }

    /// Evaluate a validated spin against drawn reel indices.
    ///
    /// Tiers are checked in priority order; on a two-of-a-kind the matching
    /// symbol is picked by the first pair found left-to-right, so the odd
    /// reel never decides the multiplier.
    pub fn evaluate(&self, stake: f64, reels: [usize; 3]) -> SlotsPlay {
        let [a, b, c] = reels;

        let (tier, payout) = if a == b && b == c {
            (PayoutTier::ThreeOfAKind, stake * self.symbols[a].multiplier)
        } else if a == b || b == c || a == c {
            let matching = if a == b {
                a
            } else if b == c {
                b
            } else {
                a
            };
            (
                PayoutTier::TwoOfAKind,
                stake * self.symbols[matching].multiplier * 0.5,
            )
        } else {
            (PayoutTier::NoMatch, 0.0)
        };

        SlotsPlay {
            reels,
            tier,
            outcome: if payout > 0.0 { GameOutcome::Win } else { GameOutcome::Loss },
            payout,
        }
    }
}
