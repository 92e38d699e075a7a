//! Feature engineering — technical indicators and direction labels.
//!
//! Turns a candle series into one row per candle carrying RSI, stochastic
//! %K / Williams %R, MACD with its signal line and the rate of change, plus
//! the realised next-candle direction used as the training label.

pub mod indicators;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Candle;

pub const RSI_SPAN: usize = 14;
pub const STOCHASTIC_WINDOW: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const ROC_PERIODS: usize = 9;

/// Names of the model inputs, in `FeatureRow::features` order.
pub const FEATURE_NAMES: [&str; 6] = [
    "rsi",
    "k_percent",
    "r_percent",
    "macd",
    "macd_signal",
    "roc",
];

/// One candle with its derived indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub rsi: f64,
    pub k_percent: f64,
    pub r_percent: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub roc: f64,
    /// `Some(true)` when the next candle closed higher. `None` on the most
    /// recent row, whose next close is not known yet.
    pub label: Option<bool>,
}

impl FeatureRow {
    /// Model input vector, see [`FEATURE_NAMES`].
    pub fn features(&self) -> [f64; 6] {
        [
            self.rsi,
            self.k_percent,
            self.r_percent,
            self.macd,
            self.macd_signal,
            self.roc,
        ]
    }

    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }
}

/// Stateless indicator pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngine;

impl FeatureEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute feature rows for an ordered candle series.
    ///
    /// Rows with any undefined indicator are dropped. Every returned row is
    /// labeled except possibly the last: the final candle is kept with
    /// `label: None` when its indicators are complete, so it can be scored.
    pub fn extract(&self, candles: &[Candle]) -> Vec<FeatureRow> {
        let n = candles.len();
        if n == 0 {
            return Vec::new();
        }

        let to_f64 = |d: Decimal| d.to_f64().unwrap_or(f64::NAN);
        let highs: Vec<f64> = candles.iter().map(|c| to_f64(c.high)).collect();
        let lows: Vec<f64> = candles.iter().map(|c| to_f64(c.low)).collect();
        let closes: Vec<f64> = candles.iter().map(|c| to_f64(c.close)).collect();

        let rsi = indicators::rsi(&closes, RSI_SPAN);
        let (k_percent, r_percent) =
            indicators::stochastic(&highs, &lows, &closes, STOCHASTIC_WINDOW);
        let (macd, macd_signal) = indicators::macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let roc = indicators::rate_of_change(&closes, ROC_PERIODS);

        let mut rows = Vec::with_capacity(n);
        for (i, candle) in candles.iter().enumerate() {
            let label = if i + 1 < n {
                Some(candle.close < candles[i + 1].close)
            } else {
                None
            };

            let (Some(rsi_i), Some(k_i), Some(r_i), Some(roc_i)) =
                (rsi[i], k_percent[i], r_percent[i], roc[i])
            else {
                continue;
            };

            let row = FeatureRow {
                timestamp: candle.timestamp,
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                rsi: rsi_i,
                k_percent: k_i,
                r_percent: r_i,
                macd: macd[i],
                macd_signal: macd_signal[i],
                roc: roc_i,
                label,
            };
            if row.features().iter().all(|v| v.is_finite()) {
                rows.push(row);
            }
        }
        rows
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
