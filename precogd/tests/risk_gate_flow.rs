//! Integration test: proposed opens flow through the Risk Gate.
//!
//! Exposure and limits come from the stub collaborators; every decision is
//! audited in the store, counted in metrics and published on the bus.

use std::sync::Arc;

use chrono::Utc;
use precog_domain::{
    Event, EventId, ExposureSnapshot, OpenPosition, OpenProposal, Price, RiskLimits, Side, Sport, Ticker,
};
use precog_engine::RiskCheck;
use precog_exec::{StubExecution, StubExposure, StubMarketData, StubRules};
use precog_store::MemoryStore;
use precogd::{Collaborators, Config, Daemon, DaemonEvent, OpenOutcome};
use rust_decimal_macros::dec;
use uuid::Uuid;

const TICKER: &str = "KXNFLGAME-25NOV16KCBUF-KC";

fn daemon(exposure: Arc<StubExposure>, rules: Arc<StubRules>) -> (Daemon<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let collaborators = Collaborators {
        market_data: Arc::new(StubMarketData::new()),
        execution: Arc::new(StubExecution::new()),
        exposure,
        rules,
    };
    let daemon = Daemon::new(Config::test(), store.clone(), collaborators).unwrap();
    (daemon, store)
}

fn proposal(size: rust_decimal::Decimal) -> OpenProposal {
    OpenProposal {
        size,
        sport: Some(Sport::new("nfl").unwrap()),
        event_id: EventId::new("KXNFLGAME-25NOV16KCBUF").unwrap(),
        ticker: Ticker::new(TICKER).unwrap(),
    }
}

#[tokio::test]
async fn test_total_exposure_rejection_is_audited() {
    let exposure = Arc::new(StubExposure::new());
    let (daemon, store) = daemon(exposure.clone(), Arc::new(StubRules::default()));
    let user = Uuid::now_v7();
    exposure
        .set_exposure(
            user,
            ExposureSnapshot {
                total: dec!(9950),
                ..ExposureSnapshot::default()
            },
        )
        .await;

    let mut receiver = daemon.event_bus().subscribe();
    let decision = daemon.propose_open(user, &proposal(dec!(100))).await.unwrap();

    let rejection = decision.rejection().unwrap();
    assert_eq!(rejection.check, RiskCheck::TotalExposure);
    assert_eq!(rejection.reason, "total exposure limit exceeded: 10050 > 10000");

    let events = store.all_events().await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::OpenRejected { user_id, check, reason, .. } => {
            assert_eq!(*user_id, user);
            assert_eq!(*check, 2);
            assert_eq!(reason, "total exposure limit exceeded: 10050 > 10000");
        },
        other => panic!("expected OpenRejected, got {:?}", other),
    }

    match receiver.try_recv() {
        Some(Ok(DaemonEvent::OpenDecided(decision))) => {
            assert!(!decision.admitted);
            assert_eq!(decision.check, Some(2));
        },
        other => panic!("expected OpenDecided, got {:?}", other),
    }

    let metrics = daemon.metrics().render().unwrap();
    assert!(metrics.contains("total_exposure"));
}

#[tokio::test]
async fn test_first_failing_check_wins() {
    let exposure = Arc::new(StubExposure::new());
    let (daemon, _store) = daemon(exposure.clone(), Arc::new(StubRules::default()));
    let user = Uuid::now_v7();

    // Breaches both total (#2) and event (#4) exposure
    exposure
        .set_exposure(
            user,
            ExposureSnapshot {
                total: dec!(9950),
                event: dec!(1990),
                ..ExposureSnapshot::default()
            },
        )
        .await;

    let decision = daemon.propose_open(user, &proposal(dec!(100))).await.unwrap();
    assert_eq!(decision.rejection().unwrap().check, RiskCheck::TotalExposure);
}

#[tokio::test]
async fn test_daily_loss_uses_user_limits() {
    let exposure = Arc::new(StubExposure::new());
    let rules = Arc::new(StubRules::default());
    let (daemon, _store) = daemon(exposure.clone(), rules.clone());
    let user = Uuid::now_v7();

    exposure
        .set_exposure(
            user,
            ExposureSnapshot {
                daily_realized_pnl: dec!(-300),
                ..ExposureSnapshot::default()
            },
        )
        .await;

    // Default daily limit of 500 admits
    assert!(daemon.propose_open(user, &proposal(dec!(100))).await.unwrap().is_admitted());

    rules
        .set_limits(
            user,
            RiskLimits {
                max_daily_loss_dollars: dec!(300),
                ..RiskLimits::default()
            },
        )
        .await;

    let decision = daemon.propose_open(user, &proposal(dec!(100))).await.unwrap();
    let rejection = decision.rejection().unwrap();
    assert_eq!(rejection.check, RiskCheck::DailyLoss);
    assert_eq!(rejection.reason, "daily loss limit reached: -300 <= -300");
}

#[tokio::test]
async fn test_rejected_open_spawns_no_worker() {
    let exposure = Arc::new(StubExposure::new());
    let (daemon, store) = daemon(exposure.clone(), Arc::new(StubRules::default()));
    let user = Uuid::now_v7();
    exposure
        .set_exposure(
            user,
            ExposureSnapshot {
                total: dec!(10000),
                ..ExposureSnapshot::default()
            },
        )
        .await;

    let outcome = daemon
        .open_position(
            OpenPosition {
                user_id: user,
                strategy_version_id: "halftime_entry:v1.2".to_string(),
                model_version_id: "elo_nfl:v3".to_string(),
                ticker: Ticker::new(TICKER).unwrap(),
                side: Side::No,
                quantity: 100,
                entry_price: Price::new(dec!(0.40)).unwrap(),
                entry_time: Utc::now(),
            },
            None,
            EventId::new("KXNFLGAME-25NOV16KCBUF").unwrap(),
        )
        .await
        .unwrap();

    match outcome {
        OpenOutcome::Rejected(rejection) => {
            assert_eq!(rejection.check, RiskCheck::TotalExposure);
            assert_eq!(rejection.reason, "total exposure limit exceeded: 10060 > 10000");
        },
        OpenOutcome::Admitted(_) => panic!("expected rejection"),
    }
    assert_eq!(daemon.worker_count().await, 0);
    assert_eq!(store.position_count().await, 0);
}

#[tokio::test]
async fn test_no_side_open_is_sized_at_complement_cost() {
    let (daemon, store) = daemon(Arc::new(StubExposure::new()), Arc::new(StubRules::default()));

    // YES 0.10 means each NO contract costs 0.90: 2000 contracts commit 1800
    let outcome = daemon
        .open_position(
            OpenPosition {
                user_id: Uuid::now_v7(),
                strategy_version_id: "halftime_entry:v1.2".to_string(),
                model_version_id: "elo_nfl:v3".to_string(),
                ticker: Ticker::new(TICKER).unwrap(),
                side: Side::No,
                quantity: 2000,
                entry_price: Price::new(dec!(0.10)).unwrap(),
                entry_time: Utc::now(),
            },
            None,
            EventId::new("KXNFLGAME-25NOV16KCBUF").unwrap(),
        )
        .await
        .unwrap();

    match outcome {
        OpenOutcome::Rejected(rejection) => {
            assert_eq!(rejection.check, RiskCheck::PositionSize);
            assert_eq!(rejection.reason, "position size limit exceeded: 1800 > 1000");
        },
        OpenOutcome::Admitted(_) => panic!("expected rejection"),
    }
    assert_eq!(store.position_count().await, 0);
}

#[tokio::test]
async fn test_invalid_limits_surface_as_errors() {
    let rules = Arc::new(StubRules::default());
    let (daemon, store) = daemon(Arc::new(StubExposure::new()), rules.clone());
    let user = Uuid::now_v7();

    rules
        .set_limits(
            user,
            RiskLimits {
                max_total_exposure_dollars: dec!(-1),
                ..RiskLimits::default()
            },
        )
        .await;

    assert!(daemon.propose_open(user, &proposal(dec!(100))).await.is_err());
    assert_eq!(store.event_count().await, 0);
}
