//! Paper broker — a deterministic simulated session.
//!
//! Every watch-list instrument gets its own seeded random-walk tick feed,
//! generated lazily up to the clock's current time. Wagers are settled by
//! comparing the price at expiry with the entry price.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{EligibilitySource, MarketData, OrderExecution};
use crate::config::PaperConfig;
use crate::engine::clock::Clock;
use crate::types::{Action, Outcome, PayoutQuote, Settlement, Tick};

/// Decimal places quoted by the simulated feed.
const PRICE_SCALE: u32 = 5;

/// Random-walk tick feed for one instrument.
struct PriceFeed {
    rng: ChaCha8Rng,
    price: f64,
    next_at: DateTime<Utc>,
    ticks: VecDeque<Tick>,
}

impl PriceFeed {
    fn new(seed: u64, start_price: f64, first_at: DateTime<Utc>) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            price: start_price,
            next_at: first_at,
            ticks: VecDeque::new(),
        }
    }

    /// Generate every tick due at or before `now` and drop those older than
    /// the history window.
    fn advance(&mut self, now: DateTime<Utc>, config: &PaperConfig) {
        let interval = ChronoDuration::milliseconds(config.tick_interval_ms.max(1) as i64);
        // Uniform on [-sqrt(3), sqrt(3)) has unit variance.
        let spread = 3f64.sqrt();

        while self.next_at <= now {
            let shock: f64 = self.rng.gen_range(-spread..spread);
            self.price = (self.price * (1.0 + config.volatility * shock)).max(f64::EPSILON);
            if let Some(price) = Decimal::from_f64(self.price) {
                self.ticks.push_back(Tick::new(self.next_at, price.round_dp(PRICE_SCALE)));
            }
            self.next_at += interval;
        }

        let horizon = now - ChronoDuration::seconds(config.history_secs as i64);
        while self.ticks.front().is_some_and(|t| t.timestamp < horizon) {
            self.ticks.pop_front();
        }
    }

    fn last_price(&self) -> Option<Decimal> {
        self.ticks.back().map(|t| t.price)
    }

    fn price_at(&self, at: DateTime<Utc>) -> Option<Decimal> {
        self.ticks
            .iter()
            .take_while(|t| t.timestamp <= at)
            .last()
            .map(|t| t.price)
    }
}

#[derive(Debug, Clone)]
struct OpenWager {
    instrument: String,
    action: Action,
    entry: Decimal,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct PaperState {
    feeds: HashMap<String, PriceFeed>,
    wagers: HashMap<String, OpenWager>,
}

/// Simulated broker implementing every collaborator trait.
pub struct PaperBroker {
    config: PaperConfig,
    watchlist: Vec<String>,
    clock: Arc<dyn Clock>,
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new(config: PaperConfig, watchlist: Vec<String>, clock: Arc<dyn Clock>) -> Self {
        info!(
            instruments = watchlist.len(),
            seed = config.seed,
            payout = config.payout,
            "Paper broker ready"
        );
        Self {
            config,
            watchlist,
            clock,
            state: Mutex::new(PaperState::default()),
        }
    }

    fn ensure_listed(&self, instrument: &str) -> Result<()> {
        if !self.watchlist.iter().any(|w| w == instrument) {
            bail!("Unknown instrument: {instrument}");
        }
        Ok(())
    }

    /// Advance the instrument's feed to now, creating it on first use.
    fn feed_mut<'a>(&self, state: &'a mut PaperState, instrument: &str) -> &'a mut PriceFeed {
        let now = self.clock.now();
        let feed = state.feeds.entry(instrument.to_string()).or_insert_with(|| {
            let first_at = now - ChronoDuration::seconds(self.config.history_secs as i64);
            let start = self.config.start_price.to_f64().unwrap_or(1.0);
            PriceFeed::new(self.config.seed ^ instrument_seed(instrument), start, first_at)
        });
        feed.advance(now, &self.config);
        feed
    }

    /// Number of wagers awaiting settlement.
    pub async fn open_wagers(&self) -> usize {
        self.state.lock().await.wagers.len()
    }
}

/// Stable per-instrument seed (FNV-1a).
fn instrument_seed(instrument: &str) -> u64 {
    instrument.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn settle(action: Action, entry: Decimal, exit: Decimal) -> Outcome {
    match (action, exit.cmp(&entry)) {
        (_, std::cmp::Ordering::Equal) => Outcome::Tie,
        (Action::Call, std::cmp::Ordering::Greater) | (Action::Put, std::cmp::Ordering::Less) => {
            Outcome::Win
        }
        _ => Outcome::Loss,
    }
}

#[async_trait]
impl MarketData for PaperBroker {
    async fn candle_history(&self, instrument: &str, period_secs: u64) -> Result<Vec<Tick>> {
        self.ensure_listed(instrument)?;
        let mut state = self.state.lock().await;
        let ticks: Vec<Tick> = self.feed_mut(&mut state, instrument).ticks.iter().copied().collect();
        debug!(instrument, period_secs, ticks = ticks.len(), "Paper history served");
        Ok(ticks)
    }

    async fn is_connected(&self) -> bool {
        true
    }
}

#[async_trait]
impl EligibilitySource for PaperBroker {
    async fn payout_quotes(&self) -> Result<Vec<PayoutQuote>> {
        Ok(self
            .watchlist
            .iter()
            .map(|instrument| PayoutQuote {
                instrument: instrument.clone(),
                payout: self.config.payout,
                kind: "currency".to_string(),
                enabled: true,
            })
            .collect())
    }
}

#[async_trait]
impl OrderExecution for PaperBroker {
    async fn place_wager(
        &self,
        amount: Decimal,
        instrument: &str,
        action: Action,
        expiration_secs: u64,
    ) -> Result<String> {
        self.ensure_listed(instrument)?;
        if amount <= Decimal::ZERO {
            bail!("Wager amount must be positive, got {amount}");
        }

        let mut state = self.state.lock().await;
        let entry = self
            .feed_mut(&mut state, instrument)
            .last_price()
            .ok_or_else(|| anyhow!("No price for {instrument}"))?;
        let expires_at = self.clock.now() + ChronoDuration::seconds(expiration_secs as i64);
        let trade_id = uuid::Uuid::new_v4().to_string();

        debug!(%trade_id, instrument, %action, %amount, %entry, "Paper wager opened");
        state.wagers.insert(
            trade_id.clone(),
            OpenWager {
                instrument: instrument.to_string(),
                action,
                entry,
                expires_at,
            },
        );
        Ok(trade_id)
    }

    async fn await_settlement(&self, trade_id: &str) -> Result<Settlement> {
        let mut state = self.state.lock().await;
        let wager = state
            .wagers
            .get(trade_id)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown trade id: {trade_id}"))?;
        if self.clock.now() < wager.expires_at {
            bail!("Trade {trade_id} has not expired yet");
        }

        let exit = self
            .feed_mut(&mut state, &wager.instrument)
            .price_at(wager.expires_at)
            .ok_or_else(|| anyhow!("Expiry price for {trade_id} is outside the history window"))?;
        state.wagers.remove(trade_id);

        let outcome = settle(wager.action, wager.entry, exit);
        debug!(trade_id, entry = %wager.entry, %exit, %outcome, "Paper wager settled");
        Ok(Settlement {
            trade_id: trade_id.to_string(),
            outcome,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::AnchoredClock;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap()
    }

    fn broker() -> PaperBroker {
        PaperBroker::new(
            PaperConfig {
                history_secs: 600,
                ..PaperConfig::default()
            },
            vec!["EURUSD_otc".to_string(), "GBPUSD_otc".to_string()],
            Arc::new(AnchoredClock::new(origin())),
        )
    }

    #[test]
    fn test_settle_rules() {
        assert_eq!(settle(Action::Call, dec!(1.1), dec!(1.2)), Outcome::Win);
        assert_eq!(settle(Action::Call, dec!(1.1), dec!(1.0)), Outcome::Loss);
        assert_eq!(settle(Action::Put, dec!(1.1), dec!(1.0)), Outcome::Win);
        assert_eq!(settle(Action::Put, dec!(1.1), dec!(1.2)), Outcome::Loss);
        assert_eq!(settle(Action::Put, dec!(1.1), dec!(1.1)), Outcome::Tie);
    }

    #[test]
    fn test_instrument_seed_is_stable_and_distinct() {
        assert_eq!(instrument_seed("EURUSD_otc"), instrument_seed("EURUSD_otc"));
        assert_ne!(instrument_seed("EURUSD_otc"), instrument_seed("GBPUSD_otc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_ordered_and_windowed() {
        let broker = broker();
        let ticks = broker.candle_history("EURUSD_otc", 60).await.unwrap();
        assert!(!ticks.is_empty());
        assert!(ticks.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(ticks[0].timestamp >= origin() - ChronoDuration::seconds(600));
        assert!(ticks.last().unwrap().timestamp <= origin());
        assert!(ticks.iter().all(|t| t.price > Decimal::ZERO));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feeds_are_deterministic_per_instrument() {
        let a = broker().candle_history("EURUSD_otc", 60).await.unwrap();
        let b = broker().candle_history("EURUSD_otc", 60).await.unwrap();
        let c = broker().candle_history("GBPUSD_otc", 60).await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_instrument_rejected() {
        let broker = broker();
        assert!(broker.candle_history("XAUUSD", 60).await.is_err());
        assert!(broker
            .place_wager(dec!(1), "XAUUSD", Action::Call, 60)
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wager_settles_after_expiry() {
        let broker = broker();
        let trade_id = broker
            .place_wager(dec!(1), "EURUSD_otc", Action::Call, 60)
            .await
            .unwrap();
        assert_eq!(broker.open_wagers().await, 1);

        assert!(broker.await_settlement(&trade_id).await.is_err());

        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        let settlement = broker.await_settlement(&trade_id).await.unwrap();
        assert_eq!(settlement.trade_id, trade_id);
        assert_eq!(broker.open_wagers().await, 0);
        assert!(broker.await_settlement(&trade_id).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_payout_quotes_cover_watchlist() {
        let quotes = broker().payout_quotes().await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert!(quotes.iter().all(|q| q.enabled && q.payout == 92));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_non_positive_amount() {
        let result = broker()
            .place_wager(Decimal::ZERO, "EURUSD_otc", Action::Put, 60)
            .await;
        assert!(result.is_err());
    }
}
