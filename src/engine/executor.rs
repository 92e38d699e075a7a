//! Trade executor.
//!
//! Places wagers through the broker's `OrderExecution` and holds the
//! caller for the full settlement window before collecting the outcome.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::broker::OrderExecution;
use crate::strategy::martingale::WagerExecutor;
use crate::types::{Action, Settlement};

/// Extra wait after expiry before asking for the outcome.
const SETTLEMENT_GRACE: Duration = Duration::from_secs(1);

pub struct Executor {
    orders: Arc<dyn OrderExecution>,
    grace: Duration,
}

impl Executor {
    pub fn new(orders: Arc<dyn OrderExecution>) -> Self {
        Self {
            orders,
            grace: SETTLEMENT_GRACE,
        }
    }

    pub fn with_grace(orders: Arc<dyn OrderExecution>, grace: Duration) -> Self {
        Self { orders, grace }
    }
}

#[async_trait]
impl WagerExecutor for Executor {
    async fn place_and_await(
        &self,
        amount: Decimal,
        instrument: &str,
        action: Action,
        expiration: Duration,
    ) -> Result<Settlement> {
        let trade_id = self
            .orders
            .place_wager(amount, instrument, action, expiration.as_secs())
            .await
            .with_context(|| format!("Placing {action} wager of {amount} on {instrument}"))?;

        info!(
            %trade_id,
            instrument,
            %action,
            amount = %amount,
            wait_secs = (expiration + self.grace).as_secs(),
            "Wager placed — waiting for settlement"
        );
        tokio::time::sleep(expiration + self.grace).await;

        let settlement = self
            .orders
            .await_settlement(&trade_id)
            .await
            .with_context(|| format!("Settling trade {trade_id} on {instrument}"))?;
        debug!(%trade_id, outcome = %settlement.outcome, "Settlement received");
        Ok(settlement)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
