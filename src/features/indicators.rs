//! Technical indicators over plain `f64` series.
//!
//! Undefined values (warm-up windows, division by zero) are `None`, never a
//! sentinel number, so callers can drop them explicitly.

/// Adjusted exponentially weighted mean with `alpha = 2 / (span + 1)`.
///
/// `y_t = sum((1-a)^i * x_{t-i}) / sum((1-a)^i)`, evaluated recursively.
/// The first output equals the first observation.
pub fn ewm_mean(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut numerator = 0.0;
    let mut weight = 0.0;
    values
        .iter()
        .map(|&x| {
            numerator = x + decay * numerator;
            weight = 1.0 + decay * weight;
            numerator / weight
        })
        .collect()
}

/// Rolling minimum over a full window; `None` until `window` values exist.
pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, f64::min)
}

/// Rolling maximum over a full window; `None` until `window` values exist.
pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, f64::max)
}

fn rolling(values: &[f64], window: usize, fold: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            values[i + 1 - window..=i].iter().copied().reduce(fold)
        })
        .collect()
}

/// Relative strength index from EWMA-smoothed gains and losses.
///
/// The first row has no price change and contributes zero to both series.
/// Undefined whenever the smoothed loss is exactly zero.
pub fn rsi(closes: &[f64], span: usize) -> Vec<Option<f64>> {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let delta = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let avg_gain = ewm_mean(&gains, span);
    let avg_loss = ewm_mean(&losses, span);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&gain, &loss)| {
            if loss == 0.0 {
                None
            } else {
                Some(100.0 - 100.0 / (1.0 + gain / loss))
            }
        })
        .collect()
}

/// Stochastic %K and Williams %R over a `window`-row high/low range.
///
/// Both are undefined until the window is full or when the range is flat.
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    window: usize,
) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let lowest = rolling_min(lows, window);
    let highest = rolling_max(highs, window);

    closes
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(&close, range)| match range {
            (Some(low), Some(high)) if high > low => {
                let span = high - low;
                (
                    Some(100.0 * (close - low) / span),
                    Some(-100.0 * (high - close) / span),
                )
            }
            _ => (None, None),
        })
        .unzip()
}

/// MACD line (`EMA fast - EMA slow`) and its EWMA signal line.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    let fast_ema = ewm_mean(closes, fast);
    let slow_ema = ewm_mean(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ewm_mean(&line, signal);
    (line, signal_line)
}

/// Fractional rate of change over `periods` rows.
pub fn rate_of_change(closes: &[f64], periods: usize) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|i| {
            if i < periods {
                return None;
            }
            let base = closes[i - periods];
            if base == 0.0 {
                None
            } else {
                Some((closes[i] - base) / base)
            }
        })
        .collect()
}
