//! Crash engine: a live race between a rising multiplier and the player's
//! cash-out decision.
//!
//! The round itself is a pure state machine (`CrashRound`) advanced by an
//! owning worker task; nothing else can mutate it, so the cash-out/crash race
//! is resolved inside one `select!` loop instead of across shared state. The
//! crash point is drawn once at round start and fixed for the round. Ties at
//! the crash boundary go to the house: the tick arm is polled first, so a
//! cash-out queued behind the fatal tick is rejected as too late.
//!
//! Settlement is invoked exactly once per round, from the single code path
//! that runs after the terminal transition. The worker exits right after,
//! which cancels its interval; no residual tick can fire once a round has
//! settled.

use crate::config::GamesConfig;
use crate::errors::{CrashError, LedgerError, StakehouseError, StakehouseResult};
use crate::fairness::{self, FairnessEngine, FairnessProof};
use crate::games::dice::validate_stake;
use crate::games::types::{CrashStartRequest, GameKind, GameOutcome, GameSession, OutcomeData};
use crate::ledger::{LedgerStore, SettlementRequest};
use crate::metrics::MetricsRegistry;
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};
use uuid::Uuid;

/// Round lifecycle. `CashedOut` and `Crashed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrashState {
    Idle,
    BetPlaced,
    Running,
    CashedOut,
    Crashed,
}

impl CrashState {
    fn name(self) -> &'static str {
        match self {
            CrashState::Idle => "idle",
            CrashState::BetPlaced => "bet_placed",
            CrashState::Running => "running",
            CrashState::CashedOut => "cashed_out",
            CrashState::Crashed => "crashed",
        }
    }
}

/// Terminal result of a round, produced exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundEnd {
    pub outcome: GameOutcome,
    pub payout: f64,
    /// Multiplier at the accepted cash-out; `None` when the round crashed.
    pub cashed_out_at: Option<f64>,
}

/// Pure crash round state machine. All transitions are explicit and illegal
/// ones return errors instead of being silently ignored.
#[derive(Debug)]
pub struct CrashRound {
    pub id: String,
    pub user_id: String,
    state: CrashState,
    stake: f64,
    crash_point: f64,
    multiplier: f64,
    increment: f64,
    fairness: FairnessProof,
}

impl CrashRound {
    pub fn new(id: String, user_id: String, fairness: FairnessProof) -> Self {
        Self {
            id,
            user_id,
            state: CrashState::Idle,
            stake: 0.0,
            crash_point: 0.0,
            multiplier: 1.0,
            increment: 0.01,
            fairness,
        }
    }

    pub fn state(&self) -> CrashState {
        self.state
    }

    pub fn stake(&self) -> f64 {
        self.stake
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn fairness(&self) -> &FairnessProof {
        &self.fairness
    }

    /// Commit a stake: `Idle -> BetPlaced`.
    pub fn place_bet(&mut self, stake: f64) -> Result<(), CrashError> {
        if self.state != CrashState::Idle {
            return Err(CrashError::InvalidTransition {
                from: self.state.name(),
                attempted: "place_bet",
            });
        }
        self.stake = stake;
        self.state = CrashState::BetPlaced;
        Ok(())
    }

    /// Start the race: `BetPlaced -> Running`. The crash point is fixed here
    /// for the whole round and never re-drawn.
    pub fn start(&mut self, crash_point: f64, increment: f64) -> Result<(), CrashError> {
        if self.state != CrashState::BetPlaced {
            return Err(CrashError::InvalidTransition {
                from: self.state.name(),
                attempted: "start",
            });
        }
        self.crash_point = crash_point;
        self.increment = increment;
        self.multiplier = 1.0;
        self.state = CrashState::Running;
        Ok(())
    }

    /// Advance the multiplier by one tick. Returns the terminal result when
    /// the crash point is reached; the caller must settle it exactly once.
    pub fn tick(&mut self) -> Option<RoundEnd> {
        if self.state != CrashState::Running {
            return None;
        }

        // Advance in exact hundredths so boundary comparisons stay clean.
        let next = ((self.multiplier + self.increment) * 100.0).round() / 100.0;
        if next >= self.crash_point {
            self.multiplier = self.crash_point;
            self.state = CrashState::Crashed;
            return Some(RoundEnd {
                outcome: GameOutcome::Loss,
                payout: 0.0,
                cashed_out_at: None,
            });
        }

        self.multiplier = next;
        None
    }

    /// Accept a cash-out at the current multiplier: `Running -> CashedOut`.
    ///
    /// Rejected once the multiplier has reached the crash point: the crash
    /// transition has priority at the boundary.
    pub fn cash_out(&mut self) -> Result<RoundEnd, CrashError> {
        match self.state {
            CrashState::Running => {}
            CrashState::Crashed | CrashState::CashedOut => return Err(CrashError::TooLate),
            other => {
                return Err(CrashError::RoundNotRunning {
                    state: other.name().to_string(),
                })
            }
        }
        if self.multiplier >= self.crash_point {
            return Err(CrashError::TooLate);
        }

        self.state = CrashState::CashedOut;
        Ok(RoundEnd {
            outcome: GameOutcome::Win,
            payout: self.stake * self.multiplier,
            cashed_out_at: Some(self.multiplier),
        })
    }

    /// Force-terminate a running round (server shutdown, player gone). The
    /// committed stake is lost; the round settles like a crash.
    pub fn abort(&mut self) -> Option<RoundEnd> {
        if self.state != CrashState::Running {
            return None;
        }
        self.state = CrashState::Crashed;
        Some(RoundEnd {
            outcome: GameOutcome::Loss,
            payout: 0.0,
            cashed_out_at: None,
        })
    }

    /// Observable view of the round. The crash point stays hidden until the
    /// round is terminal.
    pub fn snapshot(&self) -> CrashSnapshot {
        let terminal = matches!(self.state, CrashState::CashedOut | CrashState::Crashed);
        CrashSnapshot {
            round_id: self.id.clone(),
            state: self.state,
            multiplier: self.multiplier,
            crash_point: terminal.then_some(self.crash_point),
            payout: match self.state {
                CrashState::CashedOut => Some(self.stake * self.multiplier),
                CrashState::Crashed => Some(0.0),
                _ => None,
            },
        }
    }
}

/// Point-in-time view of a round, also streamed over the websocket feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashSnapshot {
    pub round_id: String,
    pub state: CrashState,
    pub multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crash_point: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<f64>,
}

enum CrashCommand {
    CashOut {
        reply: oneshot::Sender<StakehouseResult<GameSession>>,
    },
    Abort,
}

struct RoundHandle {
    cmd_tx: mpsc::Sender<CrashCommand>,
    watch_rx: watch::Receiver<CrashSnapshot>,
}

/// Owns all live crash rounds: spawns one worker task per round and routes
/// cash-out requests to it.
pub struct CrashManager {
    ledger: Arc<dyn LedgerStore>,
    fairness: Arc<FairnessEngine>,
    metrics: Arc<MetricsRegistry>,
    config: GamesConfig,
    rounds: Arc<DashMap<String, RoundHandle>>,
}

impl CrashManager {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        fairness: Arc<FairnessEngine>,
        metrics: Arc<MetricsRegistry>,
        config: GamesConfig,
    ) -> Self {
        Self {
            ledger,
            fairness,
            metrics,
            config,
            rounds: Arc::new(DashMap::new()),
        }
    }

    /// Validate the bet, draw the crash point, and start the round worker.
    pub async fn start_round(&self, request: CrashStartRequest) -> StakehouseResult<CrashSnapshot> {
        validate_stake(request.stake, self.config.min_bet, self.config.max_bet)?;

        // Stake must fit the balance before the play is accepted.
        let balance = self.ledger.balance(&request.user_id).await?;
        if balance < request.stake {
            return Err(LedgerError::InsufficientFunds {
                required: request.stake,
                available: balance,
            }
            .into());
        }

        let round_id = Uuid::new_v4().to_string();
        let nonce = self.ledger.next_nonce(&request.user_id).await?;
        let client_seed = request
            .client_seed
            .unwrap_or_else(|| hex::encode(rand::thread_rng().gen::<[u8; 16]>()));

        let draw = self.fairness.draw(
            &round_id,
            GameKind::Crash,
            &request.user_id,
            &client_seed,
            nonce,
        )?;
        let crash_point = fairness::crash_point(&draw.digest)?;

        let mut round = CrashRound::new(round_id.clone(), request.user_id.clone(), draw.proof);
        round.place_bet(request.stake)?;
        round.start(crash_point, self.config.crash_tick_increment)?;

        self.metrics.record_bet(GameKind::Crash, request.stake);
        self.spawn_worker(round);

        info!(round_id = %round_id, user_id = %request.user_id, "crash round started");

        Ok(self
            .rounds
            .get(&round_id)
            .map(|handle| handle.watch_rx.borrow().clone())
            .unwrap_or(CrashSnapshot {
                round_id,
                state: CrashState::Running,
                multiplier: 1.0,
                crash_point: None,
                payout: None,
            }))
    }

    /// Request a cash-out and wait for the worker's decision.
    pub async fn cash_out(&self, round_id: &str) -> StakehouseResult<GameSession> {
        let cmd_tx = self
            .rounds
            .get(round_id)
            .map(|handle| handle.cmd_tx.clone())
            .ok_or_else(|| CrashError::RoundNotFound(round_id.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(CrashCommand::CashOut { reply: reply_tx })
            .await
            // The worker already terminated: the round settled before the
            // request got through.
            .map_err(|_| CrashError::TooLate)?;

        reply_rx
            .await
            .map_err(|_| StakehouseError::from(CrashError::WorkerGone))?
    }

    /// Current view of a live round.
    pub fn snapshot(&self, round_id: &str) -> Option<CrashSnapshot> {
        self.rounds
            .get(round_id)
            .map(|handle| handle.watch_rx.borrow().clone())
    }

    /// Subscribe to a live round's tick feed.
    pub fn subscribe(&self, round_id: &str) -> Option<watch::Receiver<CrashSnapshot>> {
        self.rounds.get(round_id).map(|handle| handle.watch_rx.clone())
    }

    pub fn active_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Abort every live round (graceful shutdown). Each worker settles its
    /// round as a loss before exiting.
    pub async fn abort_all(&self) {
        for entry in self.rounds.iter() {
            let _ = entry.cmd_tx.send(CrashCommand::Abort).await;
        }
    }

    fn spawn_worker(&self, round: CrashRound) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (watch_tx, watch_rx) = watch::channel(round.snapshot());

        self.rounds
            .insert(round.id.clone(), RoundHandle { cmd_tx, watch_rx });
        self.metrics.set_crash_rounds_active(self.rounds.len());

        let ledger = self.ledger.clone();
        let metrics = self.metrics.clone();
        let rounds = self.rounds.clone();
        let tick_interval = std::time::Duration::from_millis(self.config.crash_tick_ms);

        tokio::spawn(async move {
            let mut round = round;
            let mut ticker = tokio::time::interval(tick_interval);
            // The first interval tick completes immediately; consume it so
            // the multiplier starts advancing one full period after start.
            ticker.tick().await;

            let (end, reply) = loop {
                tokio::select! {
                    // Tick first: at the boundary where a tick and a cash-out
                    // are both ready, the crash must win.
                    biased;
                    _ = ticker.tick() => {
                        let ended = round.tick();
                        let _ = watch_tx.send(round.snapshot());
                        if let Some(end) = ended {
                            break (end, None);
                        }
                    }
                    cmd = cmd_rx.recv() => match cmd {
                        Some(CrashCommand::CashOut { reply }) => {
                            match round.cash_out() {
                                Ok(end) => {
                                    let _ = watch_tx.send(round.snapshot());
                                    break (end, Some(reply));
                                }
                                Err(e) => {
                                    let _ = reply.send(Err(e.into()));
                                }
                            }
                        }
                        Some(CrashCommand::Abort) | None => {
                            if let Some(end) = round.abort() {
                                let _ = watch_tx.send(round.snapshot());
                                break (end, None);
                            }
                        }
                    }
                }
            };

            // The single settlement point for this round. The worker exits
            // right after, taking its interval with it.
            let settlement = SettlementRequest {
                settlement_key: round.id.clone(),
                user_id: round.user_id.clone(),
                kind: GameKind::Crash,
                stake: round.stake(),
                payout: end.payout,
                outcome: end.outcome,
                outcome_data: OutcomeData::Crash {
                    crash_point: round.crash_point,
                    cashed_out_at: end.cashed_out_at,
                },
                fairness: round.fairness().clone(),
            };

            let result = ledger.settle(settlement).await;
            match &result {
                Ok(session) => {
                    metrics.record_settlement(session.payout);
                    metrics.record_crash_end(end.cashed_out_at.is_some());
                }
                Err(e) => {
                    metrics.record_settlement_failure();
                    warn!(round_id = %round.id, error = %e, "crash settlement failed");
                }
            }

            if let Some(reply) = reply {
                let _ = reply.send(result.map_err(StakehouseError::from));
            }

            rounds.remove(&round.id);
            metrics.set_crash_rounds_active(rounds.len());
        });
    }
}
