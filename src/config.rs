//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults so a partial file is enough to run.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::strategy::martingale::{stake_at, MAX_MARTINGALE_LEVEL};
use crate::types::EngineError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    #[serde(default)]
    pub paper: PaperConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Candle width in seconds.
    pub period_secs: u64,
    /// Wager settlement window in seconds.
    pub expiration_secs: u64,
    /// How long before the candle boundary the pipeline starts.
    pub lead_secs: u64,
    pub align_poll_ms: u64,
    pub boundary_poll_ms: u64,
    /// Maximum candles carried forward per instrument.
    pub history_limit: usize,
    pub connect_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "AUGUR-001".to_string(),
            period_secs: 60,
            expiration_secs: 60,
            lead_secs: 15,
            align_poll_ms: 200,
            boundary_poll_ms: 100,
            history_limit: 2000,
            connect_timeout_secs: 30,
        }
    }
}

impl AgentConfig {
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StrategyConfig {
    /// Minimum class probability required to emit a signal.
    pub prob_threshold: f64,
    pub n_trees: usize,
    pub seed: u64,
    /// Maximum tree depth; 0 grows trees until leaves are pure.
    pub max_depth: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            prob_threshold: 0.76,
            n_trees: 100,
            seed: 0,
            max_depth: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StakingConfig {
    pub initial_amount: Decimal,
    pub martingale_level: u32,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            initial_amount: dec!(1),
            martingale_level: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EligibilityConfig {
    /// Minimum payout percentage to trade an instrument.
    pub min_payout: u8,
    pub suffix: String,
    pub watchlist: Vec<String>,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        let watchlist = [
            "EURAUD", "EURCHF", "EURGBP", "EURJPY", "EURUSD", "GBPAUD", "GBPJPY", "GBPUSD",
            "AUDCHF", "AUDJPY", "AUDUSD", "CADCHF", "AUDCAD", "CHFJPY", "USDCAD", "USDCHF",
            "USDCNH", "USDJPY",
        ]
        .iter()
        .map(|pair| format!("{pair}_otc"))
        .collect();

        Self {
            min_payout: 90,
            suffix: "_otc".to_string(),
            watchlist,
        }
    }
}

/// Simulated broker settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PaperConfig {
    pub seed: u64,
    pub start_price: Decimal,
    /// Standard deviation of a single tick move, relative to price.
    pub volatility: f64,
    pub tick_interval_ms: u64,
    /// Length of the tick window returned by a history request.
    pub history_secs: u64,
    pub payout: u8,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            start_price: dec!(1.1),
            volatility: 0.0004,
            tick_interval_ms: 500,
            history_secs: 3600,
            payout: 92,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let agent = &self.agent;
        if agent.period_secs == 0 {
            return Err(EngineError::Config("agent.period_secs must be positive".into()));
        }
        if agent.lead_secs >= agent.period_secs {
            return Err(EngineError::Config(format!(
                "agent.lead_secs ({}) must be shorter than the period ({})",
                agent.lead_secs, agent.period_secs
            )));
        }
        if agent.expiration_secs == 0 {
            return Err(EngineError::Config("agent.expiration_secs must be positive".into()));
        }
        let threshold = self.strategy.prob_threshold;
        if !(threshold > 0.5 && threshold < 1.0) {
            return Err(EngineError::Config(format!(
                "strategy.prob_threshold must be in (0.5, 1), got {threshold}"
            )));
        }
        if self.strategy.n_trees == 0 {
            return Err(EngineError::Config("strategy.n_trees must be positive".into()));
        }
        if self.staking.martingale_level == 0 {
            return Err(EngineError::Config("staking.martingale_level must be at least 1".into()));
        }
        if self.staking.initial_amount <= Decimal::ZERO {
            return Err(EngineError::Config("staking.initial_amount must be positive".into()));
        }
        if self.staking.martingale_level > MAX_MARTINGALE_LEVEL {
            return Err(EngineError::Config(format!(
                "staking.martingale_level must be at most {MAX_MARTINGALE_LEVEL}, got {}",
                self.staking.martingale_level
            )));
        }
        if stake_at(self.staking.initial_amount, self.staking.martingale_level).is_none() {
            return Err(EngineError::Config(format!(
                "staking.initial_amount {} overflows at martingale level {}",
                self.staking.initial_amount, self.staking.martingale_level
            )));
        }
        if self.eligibility.min_payout > 100 || self.paper.payout > 100 {
            return Err(EngineError::Config("payouts are percentages (0-100)".into()));
        }
        Ok(())
    }
}
