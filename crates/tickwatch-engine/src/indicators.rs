//! Pure indicator math over close-price sequences.
//!
//! RSI uses Wilder's smoothing for average gain/loss:
//! - First average: simple mean over the first `period` changes
//! - Subsequent: avg = (prev_avg * (period - 1) + current) / period
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss)), 100 when
//! avg_loss == 0. A window that the series cannot support yields `None`,
//! never a number computed on a short series.

/// Last value of the simple moving average over `window` closes.
pub fn sma(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }

    let tail = &closes[closes.len() - window..];
    let mean = tail.iter().sum::<f64>() / window as f64;
    mean.is_finite().then_some(mean)
}

/// Wilder-smoothed RSI over the full close sequence, clamped to [0, 100].
///
/// Needs `period + 1` closes (`period` price changes) to warm up.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for window in closes.windows(2) {
        let change = window[1] - window[0];
        if !change.is_finite() {
            return None;
        }
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    for index in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[index]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[index]) / period as f64;
    }

    let value = if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };

    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

/// Percent change between the two most recent closes.
///
/// Zero when the previous close is zero or either value is non-finite, so a
/// degenerate bar never turns into an infinite or NaN change.
pub fn daily_change_percent(last: f64, previous: f64) -> f64 {
    if previous == 0.0 || !previous.is_finite() || !last.is_finite() {
        return 0.0;
    }

    let change = (last - previous) / previous * 100.0;
    if change.is_finite() {
        change
    } else {
        0.0
    }
}
