//! Game orchestration: wires the fairness provider, the engines, and the
//! settlement ledger together.
//!
//! Dice and slots are synchronous request/response plays; crash rounds are
//! delegated to the `CrashManager`, which runs one worker task per round.

use crate::config::GamesConfig;
use crate::errors::{LedgerError, StakehouseResult};
use crate::fairness::{self, FairnessEngine};
use crate::games::crash::CrashManager;
use crate::games::dice::DiceEngine;
use crate::games::slots::SlotsEngine;
use crate::games::types::{
    DicePlayRequest, GameKind, GameSession, OutcomeData, SlotsPlayRequest,
};
use crate::ledger::{LedgerStore, SettlementRequest};
use crate::metrics::MetricsRegistry;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

pub struct GameService {
    ledger: Arc<dyn LedgerStore>,
    fairness: Arc<FairnessEngine>,
    metrics: Arc<MetricsRegistry>,
    dice: DiceEngine,
    slots: SlotsEngine,
    pub crash: CrashManager,
}

impl GameService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        fairness: Arc<FairnessEngine>,
        metrics: Arc<MetricsRegistry>,
        config: GamesConfig,
    ) -> Self {
        let crash = CrashManager::new(
            ledger.clone(),
            fairness.clone(),
            metrics.clone(),
            config.clone(),
        );
        Self {
            ledger,
            fairness,
            metrics,
            dice: DiceEngine::new(&config),
            slots: SlotsEngine::new(&config),
            crash,
        }
    }

    pub fn fairness_public_key(&self) -> String {
        self.fairness.public_key_hex()
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Play one dice round: validate, draw, evaluate, settle.
    pub async fn play_dice(&self, request: DicePlayRequest) -> StakehouseResult<GameSession> {
        self.dice.validate(request.stake, request.target)?;
        self.check_funds(&request.user_id, request.stake).await?;

        let game_id = Uuid::new_v4().to_string();
        let nonce = self.ledger.next_nonce(&request.user_id).await?;
        let client_seed = request.client_seed.unwrap_or_else(random_seed);

        let draw = self.fairness.draw(
            &game_id,
            GameKind::Dice,
            &request.user_id,
            &client_seed,
            nonce,
        )?;
        let roll = fairness::dice_roll(&draw.digest)?;
        let play = self.dice.evaluate(request.stake, request.target, roll);

        self.metrics.record_bet(GameKind::Dice, request.stake);
        let session = self
            .ledger
            .settle(SettlementRequest {
                settlement_key: game_id,
                user_id: request.user_id,
                kind: GameKind::Dice,
                stake: request.stake,
                payout: play.payout,
                outcome: play.outcome,
                outcome_data: OutcomeData::Dice {
                    roll: play.roll,
                    target: play.target,
                },
                fairness: draw.proof,
            })
            .await?;

        self.metrics.record_settlement(session.payout);
        Ok(session)
    }

    /// Play one slots round: validate, draw three reels, evaluate, settle.
    pub async fn play_slots(&self, request: SlotsPlayRequest) -> StakehouseResult<GameSession> {
        self.slots.validate(request.stake)?;
        self.check_funds(&request.user_id, request.stake).await?;

        let game_id = Uuid::new_v4().to_string();
        let nonce = self.ledger.next_nonce(&request.user_id).await?;
        let client_seed = request.client_seed.unwrap_or_else(random_seed);

        let draw = self.fairness.draw(
            &game_id,
            GameKind::Slots,
            &request.user_id,
            &client_seed,
            nonce,
        )?;
        let reels = fairness::reel_indices(&draw.digest, self.slots.symbol_count())?;
        let play = self.slots.evaluate(request.stake, reels);

        self.metrics.record_bet(GameKind::Slots, request.stake);
        let session = self
            .ledger
            .settle(SettlementRequest {
                settlement_key: game_id,
                user_id: request.user_id,
                kind: GameKind::Slots,
                stake: request.stake,
                payout: play.payout,
                outcome: play.outcome,
                outcome_data: OutcomeData::Slots { reels: play.reels },
                fairness: draw.proof,
            })
            .await?;

        self.metrics.record_settlement(session.payout);
        Ok(session)
    }

    /// Stake must fit the balance before a play is accepted; the ledger
    /// re-checks under its serialization point when the delta applies.
    async fn check_funds(&self, user_id: &str, stake: f64) -> StakehouseResult<()> {
        let balance = self.ledger.balance(user_id).await?;
        if balance < stake {
            return Err(LedgerError::InsufficientFunds {
                required: stake,
                available: balance,
            }
            .into());
        }
        Ok(())
    }
}

pub(crate) fn random_seed() -> String {
    hex::encode(rand::thread_rng().gen::<[u8; 16]>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LedgerConfig, StakehouseConfig};
    use crate::games::types::GameOutcome;
    use crate::ledger::MemoryLedger;

    fn service() -> GameService {
        let config = StakehouseConfig::default();
        let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new(LedgerConfig::default()));
        GameService::new(
            ledger,
            Arc::new(FairnessEngine::new_random()),
            Arc::new(MetricsRegistry::new()),
            config.games,
        )
    }

    #[tokio::test]
    async fn test_dice_play_settles_exact_balance_delta() {
        let service = service();
        service.ledger().deposit("alice", 100.0).await.unwrap();

        let session = service
            .play_dice(DicePlayRequest {
                user_id: "alice".to_string(),
                stake: 10.0,
                target: 50,
                client_seed: Some("seed".to_string()),
            })
            .await
            .unwrap();

        let balance = service.ledger().balance("alice").await.unwrap();
        assert!((balance - (100.0 - session.stake + session.payout)).abs() < 1e-9);

        match session.outcome_data {
            OutcomeData::Dice { roll, target } => {
                assert!(roll <= 100);
                assert_eq!(target, 50);
                if roll < 50 {
                    assert_eq!(session.outcome, GameOutcome::Win);
                    assert!((session.payout - 10.0 * 99.0 / 50.0).abs() < 1e-9);
                } else {
                    assert_eq!(session.outcome, GameOutcome::Loss);
                    assert_eq!(session.payout, 0.0);
                }
            }
            other => panic!("unexpected outcome data: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dice_session_proof_verifies() {
        let service = service();
        service.ledger().deposit("bob", 50.0).await.unwrap();

        let session = service
            .play_dice(DicePlayRequest {
                user_id: "bob".to_string(),
                stake: 5.0,
                target: 80,
                client_seed: None,
            })
            .await
            .unwrap();

        assert!(FairnessEngine::verify_proof(&session.fairness).unwrap());
        assert!(session.fairness.input_message.contains(&session.id));
        assert!(session.fairness.input_message.contains("bob"));
    }

    #[tokio::test]
    async fn test_slots_play_records_reels() {
        let service = service();
        service.ledger().deposit("carol", 50.0).await.unwrap();

        let session = service
            .play_slots(SlotsPlayRequest {
                user_id: "carol".to_string(),
                stake: 10.0,
                client_seed: Some("seed".to_string()),
            })
            .await
            .unwrap();

        match session.outcome_data {
            OutcomeData::Slots { reels } => {
                for reel in reels {
                    assert!(reel < 5);
                }
            }
            other => panic!("unexpected outcome data: {:?}", other),
        }
        assert!(session.payout >= 0.0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected_before_draw() {
        let service = service();
        service.ledger().deposit("dave", 5.0).await.unwrap();

        let err = service
            .play_dice(DicePlayRequest {
                user_id: "dave".to_string(),
                stake: 10.0,
                target: 50,
                client_seed: None,
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Insufficient funds"));
        // Nothing settled, balance untouched.
        assert_eq!(service.ledger().balance("dave").await.unwrap(), 5.0);
        assert!(service.ledger().sessions("dave", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_target_rejected() {
        let service = service();
        service.ledger().deposit("erin", 50.0).await.unwrap();

        let err = service
            .play_dice(DicePlayRequest {
                user_id: "erin".to_string(),
                stake: 10.0,
                target: 96,
                client_seed: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid dice target"));
    }

    #[tokio::test]
    async fn test_dice_win_rate_tracks_target() {
        // With target 95 the win probability is ~94%; 40 plays virtually
        // never all lose. This guards the comparison direction, not the
        // exact distribution.
        let service = service();
        service.ledger().deposit("frank", 10_000.0).await.unwrap();

        let mut wins = 0;
        for _ in 0..40 {
            let session = service
                .play_dice(DicePlayRequest {
                    user_id: "frank".to_string(),
                    stake: 1.0,
                    target: 95,
                    client_seed: None,
                })
                .await
                .unwrap();
            if session.outcome == GameOutcome::Win {
                wins += 1;
            }
        }
        assert!(wins > 20, "expected mostly wins at target 95, got {}/40", wins);
    }
}
