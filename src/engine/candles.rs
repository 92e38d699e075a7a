//! Candle builder.
//!
//! Resamples a raw tick history into fixed-width OHLC candles and merges
//! the result with the candles carried forward from earlier cycles, so the
//! buffer keeps history that the latest tick window no longer covers.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::types::{Candle, Tick};

// ---------------------------------------------------------------------------
// Candle buffer
// ---------------------------------------------------------------------------

/// Time-ordered candle series held for one instrument across cycles.
///
/// Invariant: timestamps are strictly increasing. Every constructor and
/// mutation re-establishes it, so callers never have to assume it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandleBuffer {
    candles: Vec<Candle>,
}

impl CandleBuffer {
    /// Build a buffer from candles in any order. When two candles share a
    /// timestamp the first one in input order is kept.
    pub fn from_candles(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        candles.dedup_by_key(|c| c.timestamp);
        Self { candles }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.candles.first().map(|c| c.timestamp)
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.candles.last().map(|c| c.timestamp)
    }

    /// Merge freshly resampled candles (`self`) with a prior buffer.
    ///
    /// Prior candles strictly older than the earliest fresh candle are kept;
    /// the rest are superseded by the fresh data. The scan stops at the first
    /// prior candle that is not older, which is sound because the prior
    /// buffer is ordered.
    pub fn carry_forward(self, prior: &CandleBuffer) -> CandleBuffer {
        let Some(earliest) = self.earliest() else {
            return prior.clone();
        };

        let mut merged: Vec<Candle> = prior
            .candles
            .iter()
            .take_while(|c| c.timestamp < earliest)
            .copied()
            .collect();
        let carried = merged.len();
        merged.extend(self.candles);

        debug!(carried, total = merged.len(), "Merged candle buffer");
        CandleBuffer::from_candles(merged)
    }

    /// Drop the oldest candles so that at most `limit` remain.
    pub fn retain_latest(&mut self, limit: usize) {
        if limit > 0 && self.candles.len() > limit {
            let excess = self.candles.len() - limit;
            self.candles.drain(..excess);
        }
    }
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Start of the `period_secs` bucket containing `ts`, aligned to the epoch.
pub fn bucket_start(ts: DateTime<Utc>, period_secs: i64) -> Option<DateTime<Utc>> {
    let start = ts.timestamp().div_euclid(period_secs) * period_secs;
    DateTime::from_timestamp(start, 0)
}

/// Resample ticks into OHLC candles. Buckets without ticks produce no
/// candle; there is no forward fill.
pub fn resample(ticks: &[Tick], period_secs: i64) -> Vec<Candle> {
    let mut sorted = ticks.to_vec();
    sorted.sort_by_key(|t| t.timestamp);

    let mut candles: Vec<Candle> = Vec::new();
    for tick in &sorted {
        let Some(start) = bucket_start(tick.timestamp, period_secs) else {
            continue;
        };
        match candles.last_mut() {
            Some(current) if current.timestamp == start => current.absorb(tick.price),
            _ => candles.push(Candle::opening(start, tick.price)),
        }
    }
    candles
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Turns tick histories into carried-forward candle buffers.
#[derive(Debug, Clone)]
pub struct CandleBuilder {
    period_secs: i64,
    history_limit: usize,
}

impl CandleBuilder {
    /// `history_limit` of 0 keeps every candle.
    pub fn new(period_secs: u64, history_limit: usize) -> Self {
        Self {
            period_secs: period_secs.max(1) as i64,
            history_limit,
        }
    }

    pub fn period_secs(&self) -> i64 {
        self.period_secs
    }

    /// Resample `ticks` and merge with `prior`.
    ///
    /// Returns `None` when the ticks produce no candle at all; the caller
    /// should skip the instrument for this cycle and keep its prior buffer.
    pub fn build(&self, prior: Option<&CandleBuffer>, ticks: &[Tick]) -> Option<CandleBuffer> {
        let fresh = CandleBuffer::from_candles(resample(ticks, self.period_secs));
        if fresh.is_empty() {
            return None;
        }

        let mut buffer = match prior {
            Some(prior) => fresh.carry_forward(prior),
            None => fresh,
        };
        buffer.retain_latest(self.history_limit);
        Some(buffer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
