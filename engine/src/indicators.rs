/// indicators.rs — Pure, Stateless Rolling Indicator Library
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
/// Every function below consumes a finite `f64` series and returns a
/// same-length series with `NaN` in the warmup region (the first `n - 1`
/// positions, or wherever the formula is undefined — e.g. a zero
/// denominator). All computations use double precision throughout; given
/// identical input, output is bit-identical modulo platform floating-point
/// differences.
///
///   SMA(n)            = mean of the trailing n observations
///   ROC(n)             = (x_t / x_{t-n} - 1) * 100
///   RSI(n)             = Wilder smoothing, alpha = 1/n
///   Bollinger(n, k)    = SMA(n) +/- k * std(n), %B = (x - lower) / (upper - lower)
///   RealizedVol(n)     = std(log returns, n) * sqrt(252)
///   OLS slope(n)       = beta = (n*Sxy - Sx*Sy) / (n*Sxx - Sx^2), x = 0..n-1
///   Z-score(n)         = (x_t - SMA(n)) / std(n)
///   ATR(n)             = SMA(n) of true range
///   ATR percentile     = percentile rank of ATR(14) within its trailing
///                        252-observation distribution, in [0, 1]
/// ─────────────────────────────────────────────────────────────────────────
use crate::models::Bar;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const ATR_PERIOD: usize = 14;
const ATR_PERCENTILE_WINDOW: usize = 252;

/// Simple moving average. Undefined (`NaN`) for the first `n - 1` entries.
/// Each window's sum is recomputed directly (mirroring `rolling_std`)
/// rather than carried incrementally, so a `NaN` anywhere in the input
/// only poisons the windows it actually falls in, not every window after it.
pub fn sma(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    if n == 0 || x.len() < n {
        return out;
    }
    for i in (n - 1)..x.len() {
        let window_sum: f64 = x[i + 1 - n..=i].iter().sum();
        out[i] = window_sum / n as f64;
    }
    out
}

/// Sample standard deviation (ddof = 1) over the trailing `n` observations.
pub fn rolling_std(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    if n < 2 || x.len() < n {
        return out;
    }
    for i in (n - 1)..x.len() {
        let window = &x[i + 1 - n..=i];
        let mean = window.iter().sum::<f64>() / n as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
        out[i] = var.sqrt();
    }
    out
}

/// Rate of change, as a percentage: `(x_t / x_{t-n} - 1) * 100`.
pub fn roc(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    for i in n..x.len() {
        let prev = x[i - n];
        out[i] = if prev != 0.0 {
            (x[i] / prev - 1.0) * 100.0
        } else {
            f64::NAN
        };
    }
    out
}

/// Wilder RSI. `avg_loss == 0` propagates as `NaN` (undefined, per spec).
pub fn rsi(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    if x.len() < n + 1 {
        return out;
    }
    let alpha = 1.0 / n as f64;

    let mut gains = Vec::with_capacity(x.len());
    let mut losses = Vec::with_capacity(x.len());
    gains.push(0.0);
    losses.push(0.0);
    for i in 1..x.len() {
        let delta = x[i] - x[i - 1];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    // Seed with a simple average over the first n deltas, then apply the
    // Wilder exponential recurrence (alpha = 1/n) from there.
    let mut avg_gain = gains[1..=n].iter().sum::<f64>() / n as f64;
    let mut avg_loss = losses[1..=n].iter().sum::<f64>() / n as f64;
    out[n] = rsi_from_avgs(avg_gain, avg_loss);

    for i in (n + 1)..x.len() {
        avg_gain = avg_gain + alpha * (gains[i] - avg_gain);
        avg_loss = avg_loss + alpha * (losses[i] - avg_loss);
        out[i] = rsi_from_avgs(avg_gain, avg_loss);
    }
    out
}

fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        f64::NAN
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Bollinger bands: returns `(upper, lower, pct_b)`.
/// `pct_b` is undefined when the band width is zero.
pub fn bollinger_bands(x: &[f64], n: usize, k: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mid = sma(x, n);
    let std = rolling_std(x, n);
    let len = x.len();
    let mut upper = vec![f64::NAN; len];
    let mut lower = vec![f64::NAN; len];
    let mut pct_b = vec![f64::NAN; len];

    for i in 0..len {
        if mid[i].is_nan() || std[i].is_nan() {
            continue;
        }
        upper[i] = mid[i] + k * std[i];
        lower[i] = mid[i] - k * std[i];
        let width = upper[i] - lower[i];
        pct_b[i] = if width != 0.0 {
            (x[i] - lower[i]) / width
        } else {
            f64::NAN
        };
    }
    (upper, lower, pct_b)
}

/// Annualized realized volatility: `std(log returns, n) * sqrt(252)`.
pub fn realized_volatility(x: &[f64], n: usize) -> Vec<f64> {
    let mut log_returns = vec![f64::NAN; x.len()];
    for i in 1..x.len() {
        if x[i - 1] > 0.0 && x[i] > 0.0 {
            log_returns[i] = (x[i] / x[i - 1]).ln();
        }
    }
    let std = rolling_std(&log_returns, n);
    std.into_iter().map(|s| s * TRADING_DAYS_PER_YEAR.sqrt()).collect()
}

/// Rolling OLS slope of `x` on `0, 1, ..., n-1` over each trailing window.
pub fn linear_regression_slope(x: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; x.len()];
    if n < 2 || x.len() < n {
        return out;
    }
    let nf = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_x2: f64 = (0..n).map(|i| (i as f64).powi(2)).sum();
    let denom = nf * sum_x2 - sum_x * sum_x;

    for i in (n - 1)..x.len() {
        let window = &x[i + 1 - n..=i];
        let sum_y: f64 = window.iter().sum();
        let sum_xy: f64 = window
            .iter()
            .enumerate()
            .map(|(j, y)| j as f64 * y)
            .sum();
        out[i] = if denom == 0.0 {
            f64::NAN
        } else {
            (nf * sum_xy - sum_x * sum_y) / denom
        };
    }
    out
}

/// Rolling z-score: `(x_t - SMA(n)) / std(n)`. `NaN` when std is zero.
pub fn zscore(x: &[f64], n: usize) -> Vec<f64> {
    let mean = sma(x, n);
    let std = rolling_std(x, n);
    (0..x.len())
        .map(|i| {
            if mean[i].is_nan() || std[i].is_nan() || std[i] == 0.0 {
                f64::NAN
            } else {
                (x[i] - mean[i]) / std[i]
            }
        })
        .collect()
}

/// True range series: `max(high-low, |high-prev_close|, |low-prev_close|)`.
fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    if bars.is_empty() {
        return tr;
    }
    tr[0] = bars[0].high - bars[0].low;
    for i in 1..bars.len() {
        let prev_close = bars[i - 1].close;
        let hl = bars[i].high - bars[i].low;
        let hc = (bars[i].high - prev_close).abs();
        let lc = (bars[i].low - prev_close).abs();
        tr[i] = hl.max(hc).max(lc);
    }
    tr
}

/// Average True Range: simple moving average of the true range over `n`.
pub fn atr(bars: &[Bar], n: usize) -> Vec<f64> {
    sma(&true_range(bars), n)
}

/// Percentile rank of the current ATR(14) within its trailing 252-bar
/// distribution, in `[0, 1]`. Undefined until 252 ATR observations exist.
pub fn atr_percentile(bars: &[Bar]) -> Vec<f64> {
    let atr14 = atr(bars, ATR_PERIOD);
    let mut out = vec![f64::NAN; bars.len()];
    for i in 0..atr14.len() {
        if atr14[i].is_nan() {
            continue;
        }
        let window_start = i + 1 >= ATR_PERCENTILE_WINDOW;
        if !window_start {
            continue;
        }
        let window = &atr14[i + 1 - ATR_PERCENTILE_WINDOW..=i];
        let valid: Vec<f64> = window.iter().copied().filter(|v| !v.is_nan()).collect();
        if valid.len() < ATR_PERCENTILE_WINDOW {
            continue;
        }
        let below = valid.iter().filter(|&&v| v <= atr14[i]).count();
        out[i] = below as f64 / valid.len() as f64;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_basic() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&x, 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 2.0).abs() < 1e-9);
        assert!((out[4] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sma_recovers_once_a_leading_nan_region_clears_the_window() {
        // A NaN-prefixed series (e.g. a dependent indicator's own warmup
        // region) must not poison every window downstream of it once the
        // window no longer contains any NaN.
        let mut x = vec![f64::NAN; 5];
        x.extend([10.0, 10.0, 10.0, 10.0, 10.0]);
        let out = sma(&x, 3);
        assert!(out[6].is_nan(), "window [4,5,6] still includes the NaN at index 4");
        assert!(
            (out[7] - 10.0).abs() < 1e-9,
            "window [5,6,7] is fully clear of the NaN prefix, expected a defined mean, got {}",
            out[7]
        );
        assert!((out[9] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn roc_basic() {
        let x = vec![100.0, 100.0, 110.0];
        let out = roc(&x, 2);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert!((out[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_all_gains_is_nan_avg_loss_zero() {
        let x: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&x, 14);
        assert!(out[14].is_nan(), "avg_loss == 0 must propagate as NaN");
    }

    #[test]
    fn bollinger_flat_series_undefined_pct_b() {
        let x = vec![50.0; 25];
        let (_, _, pct_b) = bollinger_bands(&x, 20, 2.0);
        assert!(pct_b[24].is_nan());
    }

    #[test]
    fn zscore_constant_series_is_nan() {
        let x = vec![10.0; 30];
        let out = zscore(&x, 20);
        assert!(out[25].is_nan());
    }

    #[test]
    fn linear_regression_slope_detects_uptrend() {
        let x: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let out = linear_regression_slope(&x, 30);
        assert!((out[59] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn atr_percentile_needs_252_observations() {
        let bars: Vec<Bar> = (0..300)
            .map(|i| Bar {
                date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
                    + chrono::Duration::days(i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1000,
            })
            .collect();
        let out = atr_percentile(&bars);
        assert!(out[263].is_nan(), "needs 14 (atr warmup) + 252 observations");
        assert!(!out[264].is_nan());
    }
}
