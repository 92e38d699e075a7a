//! Shared types for the AUGUR engine.
//!
//! These types form the data model used across all modules. Market data
//! (ticks, candles), decisions, wager outcomes and the error taxonomy live
//! here so that broker, strategy and engine modules can depend on them
//! without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// A single trade/quote observation from the market data feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self { timestamp, price }
    }
}

/// OHLC summary of one fixed-width time bucket.
///
/// `timestamp` is the bucket start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Candle {
    /// Start a new candle from the first tick of a bucket.
    pub fn opening(timestamp: DateTime<Utc>, price: Decimal) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    /// Fold another tick of the same bucket into the candle.
    pub fn absorb(&mut self, price: Decimal) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }
}

impl fmt::Display for Candle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} O:{} H:{} L:{} C:{}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.open,
            self.high,
            self.low,
            self.close,
        )
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Wager direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Price expected to close higher.
    Call,
    /// Price expected to close lower.
    Put,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Call => write!(f, "CALL"),
            Action::Put => write!(f, "PUT"),
        }
    }
}

/// Output of the decision gate for one instrument and cycle.
///
/// `action` is `None` when the model abstains (low confidence or not
/// enough data). `confidence` is always in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Option<Action>,
    pub confidence: f64,
}

impl Decision {
    pub fn call(confidence: f64) -> Self {
        Self {
            action: Some(Action::Call),
            confidence,
        }
    }

    pub fn put(confidence: f64) -> Self {
        Self {
            action: Some(Action::Put),
            confidence,
        }
    }

    pub fn none(confidence: f64) -> Self {
        Self {
            action: None,
            confidence,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Some(Action::Call) => write!(f, "🟢 CALL ({:.2}%)", self.confidence * 100.0),
            Some(Action::Put) => write!(f, "🔴 PUT ({:.2}%)", self.confidence * 100.0),
            None => write!(f, "⏭️ NONE ({:.2}%)", self.confidence * 100.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Wagers
// ---------------------------------------------------------------------------

/// Settled result of a single wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    /// Expiry price equal to entry price; stake returned.
    Tie,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
            Outcome::Tie => write!(f, "TIE"),
        }
    }
}

/// Broker confirmation that a wager has settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub trade_id: String,
    pub outcome: Outcome,
}

/// Lifecycle of one stake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    Pending,
    Settled(Outcome),
}

/// One level of a martingale run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeAttempt {
    /// 1-based escalation level.
    pub level: u32,
    pub amount: Decimal,
    pub trade_id: Option<String>,
    pub status: AttemptStatus,
}

impl StakeAttempt {
    pub fn pending(level: u32, amount: Decimal) -> Self {
        Self {
            level,
            amount,
            trade_id: None,
            status: AttemptStatus::Pending,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            AttemptStatus::Settled(outcome) => Some(outcome),
            AttemptStatus::Pending => None,
        }
    }
}

impl fmt::Display for StakeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            AttemptStatus::Pending => "PENDING".to_string(),
            AttemptStatus::Settled(o) => o.to_string(),
        };
        write!(f, "L{} {} → {}", self.level, self.amount, status)
    }
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Raw payout row as published by the broker for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutQuote {
    pub instrument: String,
    /// Payout percentage (0–100).
    pub payout: u8,
    /// Asset class reported by the broker, e.g. "currency".
    pub kind: String,
    pub enabled: bool,
}

/// Eligibility entry for a tradable instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub payout: u8,
    pub kind: String,
}

/// Instrument → eligibility. Ordered so passes iterate deterministically.
pub type Eligibility = BTreeMap<String, InstrumentInfo>;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for AUGUR.
///
/// Every per-instrument variant is recoverable: the scheduler logs it and
/// moves on to the next instrument.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Data unavailable for {instrument}: {message}")]
    DataUnavailable { instrument: String, message: String },

    #[error("Insufficient history for {instrument}: {candles} candles gave no usable feature rows")]
    InsufficientHistory { instrument: String, candles: usize },

    #[error("Execution failure on {instrument} at level {level}: {message}")]
    ExecutionFailure {
        instrument: String,
        level: u32,
        message: String,
        /// Attempts made before the failure; the failed one stays `Pending`.
        attempts: Vec<StakeAttempt>,
    },

    #[error("Instrument {0} is no longer eligible")]
    EligibilityStale(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
