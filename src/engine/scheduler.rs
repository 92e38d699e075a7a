//! Cycle scheduler — the align → build → decide → stake loop.
//!
//! One pass walks the eligible instruments in watch-list order. For each
//! one it aligns to `lead_secs` before the next candle boundary, refreshes
//! the candle buffer, scores the newest candle and, on a signal, waits for
//! the boundary and runs the martingale sequence. Per-instrument failures
//! are logged and never abort the pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::broker::{EligibilitySource, MarketData};
use crate::config::AppConfig;
use crate::engine::accountant::PassReport;
use crate::engine::candles::{CandleBuffer, CandleBuilder};
use crate::engine::clock::{wait_for_candle_start, wait_until_lead, Clock};
use crate::engine::eligibility::EligibilityFilter;
use crate::features::FeatureEngine;
use crate::model::forest::{ForestClassifier, ForestConfig};
use crate::strategy::gate::DecisionGate;
use crate::strategy::martingale::{
    MartingaleConfig, MartingaleRun, MartingaleStrategy, WagerExecutor,
};
use crate::types::{Decision, Eligibility, EngineError, StakeAttempt};

/// State carried between passes.
#[derive(Debug, Default)]
pub struct RunContext {
    pub eligibility: Eligibility,
    /// Candle history per instrument, merged forward every cycle.
    pub buffers: HashMap<String, CandleBuffer>,
    pub passes: u64,
}

/// Why an instrument produced no wager this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PayoutTooLow(u8),
}

/// Result of one instrument's turn.
#[derive(Debug)]
pub enum InstrumentResult {
    Skipped(SkipReason),
    NoSignal(Decision),
    Staked { run: MartingaleRun, payout: u8 },
    /// The run stopped on an execution failure at `level`.
    Abandoned {
        level: u32,
        message: String,
        attempts: Vec<StakeAttempt>,
        payout: u8,
    },
}

pub struct Scheduler {
    period_secs: u64,
    lead_secs: u64,
    align_poll: Duration,
    boundary_poll: Duration,
    market: Arc<dyn MarketData>,
    quotes: Arc<dyn EligibilitySource>,
    executor: Arc<dyn WagerExecutor>,
    clock: Arc<dyn Clock>,
    filter: EligibilityFilter,
    builder: CandleBuilder,
    features: FeatureEngine,
    gate: DecisionGate,
    staking: MartingaleStrategy,
    context: RunContext,
}

impl Scheduler {
    pub fn new(
        config: &AppConfig,
        market: Arc<dyn MarketData>,
        quotes: Arc<dyn EligibilitySource>,
        executor: Arc<dyn WagerExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let agent = &config.agent;
        let forest = ForestConfig {
            n_trees: config.strategy.n_trees,
            max_depth: (config.strategy.max_depth > 0).then_some(config.strategy.max_depth),
            seed: config.strategy.seed,
            ..ForestConfig::default()
        };

        Self {
            period_secs: agent.period_secs,
            lead_secs: agent.lead_secs,
            align_poll: Duration::from_millis(agent.align_poll_ms),
            boundary_poll: Duration::from_millis(agent.boundary_poll_ms),
            market,
            quotes,
            executor,
            clock,
            filter: EligibilityFilter::new(config.eligibility.clone()),
            builder: CandleBuilder::new(agent.period_secs, agent.history_limit),
            features: FeatureEngine::new(),
            gate: DecisionGate::new(
                Box::new(ForestClassifier::new(forest)),
                config.strategy.prob_threshold,
            ),
            staking: MartingaleStrategy::new(MartingaleConfig {
                initial_amount: config.staking.initial_amount,
                max_level: config.staking.martingale_level,
                expiration: agent.expiration(),
            }),
            context: RunContext::default(),
        }
    }

    /// Replace the decision gate (alternative classifiers, tests).
    pub fn with_gate(mut self, gate: DecisionGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Pull fresh payout quotes into the eligibility map.
    ///
    /// A failed request keeps the previous map.
    pub async fn refresh_eligibility(&mut self) {
        match self.quotes.payout_quotes().await {
            Ok(quotes) => {
                self.filter.apply(&mut self.context.eligibility, &quotes);
            }
            Err(e) => warn!(error = %e, "Payout quotes unavailable — keeping previous eligibility"),
        }
    }

    /// Run one pass over every eligible instrument.
    pub async fn run_pass(&mut self) -> PassReport {
        self.context.passes += 1;
        let mut report = PassReport::new(self.context.passes, self.clock.now());
        info!(pass = report.pass_number, "=== Pass started ===");

        self.refresh_eligibility().await;
        let instruments: Vec<String> = self
            .filter
            .watchlist()
            .iter()
            .filter(|w| self.context.eligibility.contains_key(w.as_str()))
            .cloned()
            .collect();

        if instruments.is_empty() {
            warn!(
                min_payout = self.filter.min_payout(),
                "No eligible instruments — idling one period"
            );
            tokio::time::sleep(Duration::from_secs(self.period_secs)).await;
        }

        for instrument in &instruments {
            report.instruments_considered += 1;
            match self.process_instrument(instrument).await {
                Ok(InstrumentResult::Skipped(reason)) => {
                    info!(instrument = %instrument, ?reason, "Skipped");
                    report.skipped += 1;
                }
                Ok(InstrumentResult::NoSignal(decision)) => {
                    debug!(instrument = %instrument, %decision, "No trade");
                }
                Ok(InstrumentResult::Staked { run, payout }) => {
                    report.signals += 1;
                    let net = report.record_run(&run, payout);
                    info!(
                        instrument = %instrument,
                        state = ?run.state,
                        wagers = run.attempts.len(),
                        staked = %run.total_staked(),
                        net = %net,
                        "Martingale run finished"
                    );
                    self.refresh_eligibility().await;
                }
                Ok(InstrumentResult::Abandoned {
                    level,
                    message,
                    attempts,
                    payout,
                }) => {
                    report.signals += 1;
                    let net = report.record_abandoned(&attempts, payout);
                    warn!(
                        instrument = %instrument,
                        level,
                        error = %message,
                        wagers = attempts.len(),
                        net = %net,
                        "Run abandoned"
                    );
                    self.refresh_eligibility().await;
                }
                Err(EngineError::EligibilityStale(_)) => {
                    info!(instrument = %instrument, "No longer eligible — skipping");
                    report.skipped += 1;
                }
                Err(e @ (EngineError::DataUnavailable { .. } | EngineError::InsufficientHistory { .. })) => {
                    warn!(instrument = %instrument, error = %e, "No usable data — skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(instrument = %instrument, error = %e, "Instrument cycle failed");
                    report.failures += 1;
                }
            }
        }

        report.finished_at = Some(self.clock.now());
        report
    }

    /// One instrument's turn.
    pub async fn process_instrument(
        &mut self,
        instrument: &str,
    ) -> Result<InstrumentResult, EngineError> {
        let payout = self
            .context
            .eligibility
            .get(instrument)
            .map(|info| info.payout)
            .ok_or_else(|| EngineError::EligibilityStale(instrument.to_string()))?;
        if payout < self.filter.min_payout() {
            return Ok(InstrumentResult::Skipped(SkipReason::PayoutTooLow(payout)));
        }

        wait_until_lead(self.clock.as_ref(), self.period_secs, self.lead_secs, self.align_poll).await;
        info!(instrument, payout, "Analyzing");

        let ticks = self
            .market
            .candle_history(instrument, self.period_secs)
            .await
            .map_err(|e| EngineError::DataUnavailable {
                instrument: instrument.to_string(),
                message: format!("{e:#}"),
            })?;

        let buffer = self
            .builder
            .build(self.context.buffers.get(instrument), &ticks)
            .ok_or_else(|| EngineError::DataUnavailable {
                instrument: instrument.to_string(),
                message: "history request returned no ticks".to_string(),
            })?;
        let rows = self.features.extract(buffer.candles());
        let candles = buffer.len();
        self.context.buffers.insert(instrument.to_string(), buffer);
        debug!(instrument, candles, rows = rows.len(), "Features extracted");

        if rows.is_empty() {
            return Err(EngineError::InsufficientHistory {
                instrument: instrument.to_string(),
                candles,
            });
        }

        let decision = self.gate.decide(&rows);
        let Some(action) = decision.action else {
            return Ok(InstrumentResult::NoSignal(decision));
        };

        wait_for_candle_start(self.clock.as_ref(), self.period_secs, self.boundary_poll).await;
        match self.staking.run(instrument, action, self.executor.as_ref()).await {
            Ok(run) => Ok(InstrumentResult::Staked { run, payout }),
            Err(EngineError::ExecutionFailure {
                level,
                message,
                attempts,
                ..
            }) => Ok(InstrumentResult::Abandoned {
                level,
                message,
                attempts,
                payout,
            }),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
