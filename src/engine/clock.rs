//! Wall-clock access and candle-boundary alignment waits.
//!
//! All waits poll a [`Clock`] and sleep on the tokio timer between polls, so
//! they can be driven by paused tokio time in tests.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

use crate::broker::MarketData;
use crate::types::EngineError;

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The host's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A wall clock pinned to `origin` at construction that then advances with
/// the tokio timer. Under paused tokio time it only moves when the runtime
/// auto-advances, which makes long alignment waits instant and repeatable.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl AnchoredClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}

/// Start of the candle after the one containing `now`.
pub fn next_boundary(now: DateTime<Utc>, period_secs: u64) -> DateTime<Utc> {
    let period = period_secs.max(1) as i64;
    let next = (now.timestamp().div_euclid(period) + 1) * period;
    DateTime::from_timestamp(next, 0).unwrap_or(now)
}

/// Whether `now` lies inside the whole second that opens a candle.
pub fn is_candle_start(now: DateTime<Utc>, period_secs: u64) -> bool {
    now.timestamp().rem_euclid(period_secs.max(1) as i64) == 0
}

/// Block until `lead_secs` before the next candle boundary.
pub async fn wait_until_lead(clock: &dyn Clock, period_secs: u64, lead_secs: u64, poll: Duration) {
    let lead = chrono::Duration::seconds(lead_secs as i64);
    loop {
        let now = clock.now();
        if now >= next_boundary(now, period_secs) - lead {
            debug!(now = %now, lead_secs, "Aligned ahead of boundary");
            return;
        }
        sleep(poll).await;
    }
}

/// Block until a new candle opens.
pub async fn wait_for_candle_start(clock: &dyn Clock, period_secs: u64, poll: Duration) {
    loop {
        let now = clock.now();
        if is_candle_start(now, period_secs) {
            debug!(now = %now, "Candle boundary reached");
            return;
        }
        sleep(poll).await;
    }
}

/// Poll the session until it reports connected, failing after `limit`.
pub async fn wait_for_connection(
    market: &dyn MarketData,
    poll: Duration,
    limit: Duration,
) -> Result<(), EngineError> {
    info!("Waiting for broker session...");
    let connected = timeout(limit, async {
        while !market.is_connected().await {
            sleep(poll).await;
        }
    })
    .await;

    match connected {
        Ok(()) => {
            info!("✅ Session established");
            Ok(())
        }
        Err(_) => Err(EngineError::Connection(format!(
            "no session after {}s",
            limit.as_secs()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
