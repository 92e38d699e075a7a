//! End-to-end pipeline tests.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use augur::broker::paper::PaperBroker;
use augur::config::AppConfig;
use augur::engine::accountant::Accountant;
use augur::engine::candles::CandleBuilder;
use augur::engine::clock::{wait_for_connection, AnchoredClock};
use augur::engine::executor::Executor;
use augur::engine::scheduler::Scheduler;
use augur::features::FeatureEngine;
use augur::model::forest::{ForestClassifier, ForestConfig};
use augur::model::{Classifier, Dataset, ModelError};
use augur::strategy::gate::DecisionGate;
use augur::types::{Action, Outcome, PayoutQuote, Tick};

use crate::mock_broker::MockBroker;

/// Always predicts the same up-move probability.
struct FixedClassifier(f64);

impl Classifier for FixedClassifier {
    fn fit_predict(&self, train: &Dataset, _sample: &[f64]) -> Result<f64, ModelError> {
        if train.n_samples() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        Ok(self.0)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 5).unwrap()
}

/// Two ticks per minute for `minutes` minutes ending before `origin`.
fn history(minutes: i64) -> Vec<Tick> {
    let start = Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap() - ChronoDuration::minutes(minutes);
    let steps = [dec!(0.0000), dec!(0.0025), dec!(0.0012), dec!(0.0004)];
    (0..minutes)
        .flat_map(|i| {
            let close = dec!(1.1) + steps[(i % 4) as usize] + Decimal::from(i) * dec!(0.00005);
            let minute = start + ChronoDuration::minutes(i);
            [
                Tick::new(minute + ChronoDuration::seconds(5), close - dec!(0.0004)),
                Tick::new(minute + ChronoDuration::seconds(50), close),
            ]
        })
        .collect()
}

fn quote(instrument: &str, payout: u8) -> PayoutQuote {
    PayoutQuote {
        instrument: instrument.to_string(),
        payout,
        kind: "currency".to_string(),
        enabled: true,
    }
}

fn config(watchlist: &[&str]) -> AppConfig {
    let mut config = AppConfig::default();
    config.eligibility.watchlist = watchlist.iter().map(|w| w.to_string()).collect();
    config
}

#[test]
fn test_twenty_ticks_over_two_periods() {
    let t0 = Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap();
    let ticks: Vec<Tick> = (0..20)
        .map(|i| {
            Tick::new(
                t0 + ChronoDuration::seconds(i * 6),
                dec!(1.1000) + Decimal::from(i) * dec!(0.0001),
            )
        })
        .collect();

    let buffer = CandleBuilder::new(60, 0).build(None, &ticks).unwrap();
    let candles = buffer.candles();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].timestamp, t0);
    assert_eq!(candles[1].timestamp, t0 + ChronoDuration::seconds(60));
    assert!(candles[1].close > candles[0].close);
    assert_eq!(candles[0].open, dec!(1.1000));
    assert_eq!(candles[1].close, dec!(1.1019));
}

#[test]
fn test_warm_up_history_yields_complete_rows() {
    let buffer = CandleBuilder::new(60, 0).build(None, &history(45)).unwrap();
    assert_eq!(buffer.len(), 45);

    let rows = FeatureEngine::new().extract(buffer.candles());
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r.features().iter().all(|v| v.is_finite())));
    assert!(rows.iter().all(|r| (0.0..=100.0).contains(&r.rsi)));
    let (last, earlier) = rows.split_last().unwrap();
    assert!(!last.is_labeled());
    assert!(earlier.iter().all(|r| r.is_labeled()));
}

#[test]
fn test_carry_forward_across_cycles() {
    let builder = CandleBuilder::new(60, 0);
    let all = history(50);
    let first = builder.build(None, &all[..60]).unwrap();
    let second = builder.build(Some(&first), &all[40..]).unwrap();

    assert_eq!(second.len(), 50);
    assert!(second
        .candles()
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp));
}

#[test]
fn test_forest_gate_on_extracted_rows_is_reproducible() {
    let buffer = CandleBuilder::new(60, 0).build(None, &history(60)).unwrap();
    let rows = FeatureEngine::new().extract(buffer.candles());
    let gate = || {
        DecisionGate::new(
            Box::new(ForestClassifier::new(ForestConfig {
                n_trees: 25,
                seed: 7,
                ..ForestConfig::default()
            })),
            0.76,
        )
    };

    let first = gate().decide(&rows);
    let second = gate().decide(&rows);
    assert_eq!(first, second);
    assert!((0.5..=1.0).contains(&first.confidence));
    assert_eq!(first.action.is_some(), first.confidence > 0.76);
}

#[tokio::test(start_paused = true)]
async fn test_pass_escalates_then_wins() {
    let broker = Arc::new(MockBroker::new(
        history(60),
        vec![quote("EURUSD_otc", 92)],
        &[Outcome::Loss, Outcome::Win],
    ));
    let cfg = config(&["EURUSD_otc"]);
    let mut scheduler = Scheduler::new(
        &cfg,
        broker.clone(),
        broker.clone(),
        Arc::new(Executor::new(broker.clone())),
        Arc::new(AnchoredClock::new(origin())),
    )
    .with_gate(DecisionGate::new(Box::new(FixedClassifier(0.1)), 0.76));

    let report = scheduler.run_pass().await;

    let placed = broker.placed();
    assert_eq!(placed.len(), 2);
    assert_eq!(placed[0].amount, dec!(1));
    assert_eq!(placed[1].amount, dec!(2));
    assert!(placed.iter().all(|w| w.action == Action::Put && w.expiration_secs == 60));

    assert_eq!(report.signals, 1);
    assert_eq!(report.runs_won, 1);
    // -1 + 2 * 0.92
    assert_eq!(report.net_pnl, dec!(0.84));
}

#[tokio::test(start_paused = true)]
async fn test_pass_caps_after_four_losses() {
    let broker = Arc::new(MockBroker::new(
        history(60),
        vec![quote("EURUSD_otc", 92)],
        &[Outcome::Loss; 4],
    ));
    let cfg = config(&["EURUSD_otc"]);
    let mut scheduler = Scheduler::new(
        &cfg,
        broker.clone(),
        broker.clone(),
        Arc::new(Executor::new(broker.clone())),
        Arc::new(AnchoredClock::new(origin())),
    )
    .with_gate(DecisionGate::new(Box::new(FixedClassifier(0.9)), 0.76));

    let report = scheduler.run_pass().await;
    let amounts: Vec<Decimal> = broker.placed().iter().map(|w| w.amount).collect();
    assert_eq!(amounts, vec![dec!(1), dec!(2), dec!(4), dec!(8)]);
    assert_eq!(report.runs_capped, 1);

    let mut accountant = Accountant::new();
    let stats = accountant.reconcile(&report);
    assert_eq!(stats.net_pnl, dec!(-15));
}

#[tokio::test(start_paused = true)]
async fn test_low_payout_instrument_never_traded() {
    let broker = Arc::new(MockBroker::new(
        history(60),
        vec![quote("EURUSD_otc", 92), quote("GBPUSD_otc", 70)],
        &[Outcome::Win],
    ));
    let cfg = config(&["EURUSD_otc", "GBPUSD_otc"]);
    let mut scheduler = Scheduler::new(
        &cfg,
        broker.clone(),
        broker.clone(),
        Arc::new(Executor::new(broker.clone())),
        Arc::new(AnchoredClock::new(origin())),
    )
    .with_gate(DecisionGate::new(Box::new(FixedClassifier(0.9)), 0.76));

    let report = scheduler.run_pass().await;
    assert_eq!(report.instruments_considered, 1);
    assert!(broker.placed().iter().all(|w| w.instrument == "EURUSD_otc"));
}

#[tokio::test(start_paused = true)]
async fn test_paper_session_runs_a_pass() {
    let mut cfg = config(&["EURUSD_otc"]);
    cfg.strategy.n_trees = 25;
    let clock = Arc::new(AnchoredClock::new(origin()));
    let broker = Arc::new(PaperBroker::new(
        cfg.paper.clone(),
        cfg.eligibility.watchlist.clone(),
        clock.clone(),
    ));

    wait_for_connection(broker.as_ref(), Duration::from_millis(100), Duration::from_secs(1))
        .await
        .unwrap();

    let mut scheduler = Scheduler::new(
        &cfg,
        broker.clone(),
        broker.clone(),
        Arc::new(Executor::new(broker.clone())),
        clock,
    );
    let report = scheduler.run_pass().await;

    assert_eq!(report.instruments_considered, 1);
    assert_eq!(report.failures, 0);
    assert!(scheduler.context().buffers["EURUSD_otc"].len() >= 59);
    assert_eq!(broker.open_wagers().await, 0);
}
