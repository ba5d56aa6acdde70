//! End-to-end flow across the game service: fund an account, play each
//! game, and check that every settlement leaves the ledger exactly
//! consistent with the returned session records.

use stakehouse::config::StakehouseConfig;
use stakehouse::games::types::{
    CrashStartRequest, DicePlayRequest, GameKind, GameOutcome, OutcomeData, SlotsPlayRequest,
};
use stakehouse::{FairnessEngine, GameService, LedgerStore, MemoryLedger, MetricsRegistry};
use std::sync::Arc;
use std::time::Duration;

fn build_service(config: StakehouseConfig) -> (Arc<GameService>, Arc<dyn LedgerStore>) {
    let ledger: Arc<dyn LedgerStore> = Arc::new(MemoryLedger::new(config.ledger.clone()));
    let service = Arc::new(GameService::new(
        ledger.clone(),
        Arc::new(FairnessEngine::new_random()),
        Arc::new(MetricsRegistry::new()),
        config.games.clone(),
    ));
    (service, ledger)
}

#[tokio::test]
async fn test_dice_and_slots_flow_keeps_ledger_consistent() {
    let (service, ledger) = build_service(StakehouseConfig::default());
    ledger.deposit("player-1", 500.0).await.unwrap();

    let mut expected_balance = 500.0;
    for _ in 0..10 {
        let session = service
            .play_dice(DicePlayRequest {
                user_id: "player-1".to_string(),
                stake: 10.0,
                target: 50,
                client_seed: None,
            })
            .await
            .unwrap();

        expected_balance = expected_balance - session.stake + session.payout;
        let balance = ledger.balance("player-1").await.unwrap();
        assert!(
            (balance - expected_balance).abs() < 1e-9,
            "balance drifted: {} vs {}",
            balance,
            expected_balance
        );
        assert!(FairnessEngine::verify_proof(&session.fairness).unwrap());
    }

    for _ in 0..10 {
        let session = service
            .play_slots(SlotsPlayRequest {
                user_id: "player-1".to_string(),
                stake: 5.0,
                client_seed: None,
            })
            .await
            .unwrap();

        expected_balance = expected_balance - session.stake + session.payout;
        let balance = ledger.balance("player-1").await.unwrap();
        assert!((balance - expected_balance).abs() < 1e-9);
    }

    assert_eq!(ledger.sessions("player-1", 100).await.len(), 20);
}

#[tokio::test]
async fn test_crash_round_runs_to_crash_and_settles_once() {
    // Giant tick increment so the multiplier overtakes any crash point
    // within a few ticks and the test finishes quickly.
    let mut config = StakehouseConfig::default();
    config.games.crash_tick_ms = 5;
    config.games.crash_tick_increment = 100.0;

    let (service, ledger) = build_service(config);
    ledger.deposit("player-2", 100.0).await.unwrap();

    let snapshot = service
        .crash
        .start_round(CrashStartRequest {
            user_id: "player-2".to_string(),
            stake: 20.0,
            client_seed: None,
        })
        .await
        .unwrap();
    let round_id = snapshot.round_id.clone();

    // Wait for the round to crash and settle.
    let mut session = None;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if let Some(found) = ledger.session_by_id(&round_id).await {
            session = Some(found);
            break;
        }
    }
    let session = session.expect("crash round never settled");

    assert_eq!(session.kind, GameKind::Crash);
    assert_eq!(session.outcome, GameOutcome::Loss);
    assert_eq!(session.payout, 0.0);
    match session.outcome_data {
        OutcomeData::Crash { crash_point, cashed_out_at } => {
            assert!(crash_point >= 1.01);
            assert_eq!(cashed_out_at, None);
        }
        other => panic!("unexpected outcome data: {:?}", other),
    }

    // Exactly one settlement: one session record, stake debited once.
    assert_eq!(ledger.sessions("player-2", 10).await.len(), 1);
    assert!((ledger.balance("player-2").await.unwrap() - 80.0).abs() < 1e-9);

    // The round is gone from the live registry; late cash-out is rejected.
    assert!(service.crash.snapshot(&round_id).is_none());
    assert!(service.crash.cash_out(&round_id).await.is_err());
}

#[tokio::test]
async fn test_crash_cash_out_pays_current_multiplier() {
    let (service, ledger) = build_service(StakehouseConfig::default());
    ledger.deposit("player-3", 100.0).await.unwrap();

    let snapshot = service
        .crash
        .start_round(CrashStartRequest {
            user_id: "player-3".to_string(),
            stake: 10.0,
            client_seed: None,
        })
        .await
        .unwrap();

    // Cash out right away, before the multiplier has climbed far. If the
    // round crashed first (lowest possible crash points), the rejection
    // path must still settle the round exactly once.
    match service.crash.cash_out(&snapshot.round_id).await {
        Ok(session) => {
            assert_eq!(session.outcome, GameOutcome::Win);
            match session.outcome_data {
                OutcomeData::Crash { crash_point, cashed_out_at } => {
                    let at = cashed_out_at.expect("cash-out multiplier missing");
                    assert!(at < crash_point);
                    assert!((session.payout - session.stake * at).abs() < 1e-9);
                }
                other => panic!("unexpected outcome data: {:?}", other),
            }
            let balance = ledger.balance("player-3").await.unwrap();
            assert!((balance - (100.0 - session.stake + session.payout)).abs() < 1e-9);
        }
        Err(_) => {
            // Too late: the round crashed before the request arrived.
            let mut settled = None;
            for _ in 0..200 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if let Some(found) = ledger.session_by_id(&snapshot.round_id).await {
                    settled = Some(found);
                    break;
                }
            }
            let session = settled.expect("rejected round never settled");
            assert_eq!(session.outcome, GameOutcome::Loss);
            assert!((ledger.balance("player-3").await.unwrap() - 90.0).abs() < 1e-9);
        }
    }

    assert_eq!(ledger.sessions("player-3", 10).await.len(), 1);
}

#[tokio::test]
async fn test_crash_session_proof_verifies_and_recomputes() {
    let mut config = StakehouseConfig::default();
    config.games.crash_tick_ms = 5;
    config.games.crash_tick_increment = 100.0;

    let (service, ledger) = build_service(config);
    ledger.deposit("player-4", 50.0).await.unwrap();

    let snapshot = service
        .crash
        .start_round(CrashStartRequest {
            user_id: "player-4".to_string(),
            stake: 5.0,
            client_seed: Some("my-seed".to_string()),
        })
        .await
        .unwrap();

    let mut session = None;
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if let Some(found) = ledger.session_by_id(&snapshot.round_id).await {
            session = Some(found);
            break;
        }
    }
    let session = session.expect("round never settled");

    // The recorded tuple verifies and pins the crash point that was used.
    assert!(FairnessEngine::verify_proof(&session.fairness).unwrap());
    assert_eq!(session.fairness.client_seed, "my-seed");

    let digest: [u8; 32] = hex::decode(&session.fairness.vrf_output)
        .unwrap()
        .try_into()
        .unwrap();
    let recomputed = stakehouse::fairness::crash_point(&digest).unwrap();
    match session.outcome_data {
        OutcomeData::Crash { crash_point, .. } => assert_eq!(crash_point, recomputed),
        other => panic!("unexpected outcome data: {:?}", other),
    }
}

#[tokio::test]
async fn test_wallet_and_play_share_one_balance() {
    let (service, ledger) = build_service(StakehouseConfig::default());

    ledger.deposit("player-5", 200.0).await.unwrap();
    ledger.withdraw("player-5", 50.0).await.unwrap();

    let session = service
        .play_dice(DicePlayRequest {
            user_id: "player-5".to_string(),
            stake: 25.0,
            target: 80,
            client_seed: None,
        })
        .await
        .unwrap();

    let balance = ledger.balance("player-5").await.unwrap();
    assert!((balance - (150.0 - 25.0 + session.payout)).abs() < 1e-9);

    // Withdrawing more than the post-play balance is rejected.
    assert!(ledger.withdraw("player-5", balance + 1.0).await.is_err());
}
