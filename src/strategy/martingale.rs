//! Martingale staking state machine.
//!
//! Starts at the base stake, doubles after every loss and stops on the
//! first non-losing outcome or once the level cap has been lost.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::types::{Action, AttemptStatus, EngineError, Outcome, Settlement, StakeAttempt};

/// Places one wager and blocks until it has settled.
///
/// Implementations must not return before the settlement window has
/// elapsed; the state machine relies on that to pace its levels.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WagerExecutor: Send + Sync {
    async fn place_and_await(
        &self,
        amount: Decimal,
        instrument: &str,
        action: Action,
        expiration: Duration,
    ) -> Result<Settlement>;
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Highest level a run may be configured with.
pub const MAX_MARTINGALE_LEVEL: u32 = 64;

/// `initial * 2^(level - 1)`, or `None` when it does not fit a `Decimal`.
pub fn stake_at(initial: Decimal, level: u32) -> Option<Decimal> {
    (1..level).try_fold(initial, |amount, _| amount.checked_mul(Decimal::TWO))
}

/// Position in a martingale run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// About to stake at this level.
    Level(u32),
    /// Terminal: a non-losing outcome at this level.
    WonAtLevel(u32),
    /// Terminal: every level lost.
    CappedLoss,
}

/// Transition after the wager at `level` settled with `outcome`.
pub fn next_state(level: u32, outcome: Outcome, max_level: u32) -> RunState {
    match outcome {
        Outcome::Win | Outcome::Tie => RunState::WonAtLevel(level),
        Outcome::Loss if level < max_level => RunState::Level(level + 1),
        Outcome::Loss => RunState::CappedLoss,
    }
}

/// Full audit trail of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MartingaleRun {
    pub instrument: String,
    pub action: Action,
    pub attempts: Vec<StakeAttempt>,
    pub state: RunState,
}

impl MartingaleRun {
    pub fn amounts(&self) -> Vec<Decimal> {
        self.attempts.iter().map(|a| a.amount).collect()
    }

    pub fn total_staked(&self) -> Decimal {
        self.attempts.iter().map(|a| a.amount).sum()
    }

    pub fn is_won(&self) -> bool {
        matches!(self.state, RunState::WonAtLevel(_))
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MartingaleConfig {
    pub initial_amount: Decimal,
    pub max_level: u32,
    pub expiration: Duration,
}

pub struct MartingaleStrategy {
    config: MartingaleConfig,
}

impl MartingaleStrategy {
    pub fn new(config: MartingaleConfig) -> Self {
        Self { config }
    }

    /// Stake at `level`: `initial_amount * 2^(level - 1)`.
    pub fn amount_at(&self, level: u32) -> Option<Decimal> {
        stake_at(self.config.initial_amount, level)
    }

    /// Run the sequence to a terminal state.
    ///
    /// A failing executor call abandons the run. The error carries every
    /// attempt made so far; the one in flight stays `Pending` and is never
    /// counted as a loss.
    pub async fn run(
        &self,
        instrument: &str,
        action: Action,
        executor: &dyn WagerExecutor,
    ) -> Result<MartingaleRun, EngineError> {
        let max_level = self.config.max_level.max(1);
        let mut attempts: Vec<StakeAttempt> = Vec::new();
        let mut state = RunState::Level(1);

        while let RunState::Level(level) = state {
            let amount = self.amount_at(level).ok_or_else(|| {
                EngineError::Config(format!(
                    "stake at martingale level {level} overflows (initial {})",
                    self.config.initial_amount
                ))
            })?;
            info!(
                instrument,
                %action,
                level,
                amount = %amount,
                expiration_secs = self.config.expiration.as_secs(),
                "🚀 TRADE"
            );
            attempts.push(StakeAttempt::pending(level, amount));

            let settlement = match executor
                .place_and_await(amount, instrument, action, self.config.expiration)
                .await
            {
                Ok(settlement) => settlement,
                Err(e) => {
                    warn!(instrument, level, error = %e, "Wager failed — abandoning run");
                    return Err(EngineError::ExecutionFailure {
                        instrument: instrument.to_string(),
                        level,
                        message: format!("{e:#}"),
                        attempts,
                    });
                }
            };

            info!(
                instrument,
                trade_id = %settlement.trade_id,
                outcome = %settlement.outcome,
                "🎲 RESULT"
            );
            if let Some(attempt) = attempts.last_mut() {
                attempt.trade_id = Some(settlement.trade_id);
                attempt.status = AttemptStatus::Settled(settlement.outcome);
            }

            state = next_state(level, settlement.outcome, max_level);
            match state {
                RunState::Level(next) => info!(instrument, level = next, "❌ LOSS - escalating"),
                RunState::WonAtLevel(_) => info!(instrument, level, "✅ WIN - resetting to base amount"),
                RunState::CappedLoss => warn!(
                    instrument,
                    max_level,
                    lost = %attempts.iter().map(|a| a.amount).sum::<Decimal>(),
                    "⚠️ Max martingale level reached - resetting"
                ),
            }
        }

        Ok(MartingaleRun {
            instrument: instrument.to_string(),
            action,
            attempts,
            state,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
