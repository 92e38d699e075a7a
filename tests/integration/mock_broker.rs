//! Mock broker for integration testing.
//!
//! Provides a deterministic implementation of all three broker traits:
//! a fixed tick history, fixed payout quotes and a scripted sequence of
//! wager outcomes, all in-memory.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use augur::broker::{EligibilitySource, MarketData, OrderExecution};
use augur::types::{Action, Outcome, PayoutQuote, Settlement, Tick};

/// A wager as the broker received it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWager {
    pub trade_id: String,
    pub instrument: String,
    pub action: Action,
    pub amount: Decimal,
    pub expiration_secs: u64,
}

pub struct MockBroker {
    history: Vec<Tick>,
    quotes: Vec<PayoutQuote>,
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    placed: Arc<Mutex<Vec<PlacedWager>>>,
    /// If set, all operations will return this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockBroker {
    pub fn new(history: Vec<Tick>, quotes: Vec<PayoutQuote>, outcomes: &[Outcome]) -> Self {
        Self {
            history,
            quotes,
            outcomes: Arc::new(Mutex::new(outcomes.iter().copied().collect())),
            placed: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Every wager placed so far.
    pub fn placed(&self) -> Vec<PlacedWager> {
        self.placed.lock().unwrap().clone()
    }

    fn check_error(&self) -> Result<()> {
        if let Some(ref msg) = *self.force_error.lock().unwrap() {
            bail!("{msg}");
        }
        Ok(())
    }
}

#[async_trait]
impl MarketData for MockBroker {
    async fn candle_history(&self, _instrument: &str, _period_secs: u64) -> Result<Vec<Tick>> {
        self.check_error()?;
        Ok(self.history.clone())
    }

    async fn is_connected(&self) -> bool {
        self.force_error.lock().unwrap().is_none()
    }
}

#[async_trait]
impl EligibilitySource for MockBroker {
    async fn payout_quotes(&self) -> Result<Vec<PayoutQuote>> {
        self.check_error()?;
        Ok(self.quotes.clone())
    }
}

#[async_trait]
impl OrderExecution for MockBroker {
    async fn place_wager(
        &self,
        amount: Decimal,
        instrument: &str,
        action: Action,
        expiration_secs: u64,
    ) -> Result<String> {
        self.check_error()?;
        let trade_id = format!("mock-{}", Uuid::new_v4());
        self.placed.lock().unwrap().push(PlacedWager {
            trade_id: trade_id.clone(),
            instrument: instrument.to_string(),
            action,
            amount,
            expiration_secs,
        });
        Ok(trade_id)
    }

    async fn await_settlement(&self, trade_id: &str) -> Result<Settlement> {
        self.check_error()?;
        if !self.placed.lock().unwrap().iter().any(|w| w.trade_id == trade_id) {
            bail!("Unknown trade id: {trade_id}");
        }
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("No scripted outcome left for {trade_id}"))?;
        Ok(Settlement {
            trade_id: trade_id.to_string(),
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_scripted_settlement() {
        let broker = MockBroker::new(Vec::new(), Vec::new(), &[Outcome::Loss, Outcome::Win]);
        let first = broker.place_wager(dec!(1), "EURUSD_otc", Action::Call, 60).await.unwrap();
        let second = broker.place_wager(dec!(2), "EURUSD_otc", Action::Call, 60).await.unwrap();

        assert_eq!(broker.await_settlement(&first).await.unwrap().outcome, Outcome::Loss);
        assert_eq!(broker.await_settlement(&second).await.unwrap().outcome, Outcome::Win);
        assert_eq!(broker.placed().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_unknown_trade() {
        let broker = MockBroker::new(Vec::new(), Vec::new(), &[Outcome::Win]);
        assert!(broker.await_settlement("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_forced_error() {
        let broker = MockBroker::new(Vec::new(), Vec::new(), &[]);
        assert!(broker.is_connected().await);
        broker.set_error("session lost");
        assert!(!broker.is_connected().await);
        assert!(broker.payout_quotes().await.is_err());
        assert!(broker.candle_history("EURUSD_otc", 60).await.is_err());
    }
}
