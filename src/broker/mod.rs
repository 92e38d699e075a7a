//! Broker integrations.
//!
//! Defines the three collaborator traits the engine talks to and provides a
//! deterministic paper implementation:
//! - `MarketData` — tick history and session state
//! - `EligibilitySource` — payout quotes per instrument
//! - `OrderExecution` — wager placement and settlement

pub mod paper;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{Action, PayoutQuote, Settlement, Tick};

/// Read side of a broker session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Recent ticks for `instrument`, oldest first.
    ///
    /// `period_secs` is the candle width the caller will resample into; the
    /// broker may use it to size the window it returns.
    async fn candle_history(&self, instrument: &str, period_secs: u64) -> Result<Vec<Tick>>;

    /// Whether the session is established and data can be requested.
    async fn is_connected(&self) -> bool;
}

/// Source of per-instrument payout quotes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EligibilitySource: Send + Sync {
    async fn payout_quotes(&self) -> Result<Vec<PayoutQuote>>;
}

/// Write side of a broker session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderExecution: Send + Sync {
    /// Place a fixed-time wager and return the broker's trade id.
    async fn place_wager(
        &self,
        amount: Decimal,
        instrument: &str,
        action: Action,
        expiration_secs: u64,
    ) -> Result<String>;

    /// Outcome of a previously placed wager.
    ///
    /// Fails if the wager has not expired yet.
    async fn await_settlement(&self, trade_id: &str) -> Result<Settlement>;
}
