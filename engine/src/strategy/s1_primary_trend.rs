//! S1 — Primary trend: 50/250-day SMA with a 0.5% hysteresis band held
//! for two consecutive closes, preventing whipsaw right at the crossover.

use crate::indicators::sma;
use crate::models::{BarHistory, SignalStrength, SubStrategySignal};
use crate::strategy::SubStrategy;

const DEFAULT_WEIGHT: f64 = 0.25;
const HYSTERESIS_PCT: f64 = 0.005;
const CONFIRM_DAYS: usize = 2;

/// Weight carries the configured value (spec default 0.25); the rest of
/// the rule is fixed.
pub struct S1PrimaryTrend {
    pub weight: f64,
}

impl Default for S1PrimaryTrend {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl SubStrategy for S1PrimaryTrend {
    fn name(&self) -> &'static str {
        "S1_PrimaryTrend"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn compute(&self, history: &BarHistory) -> SubStrategySignal {
        let close = history.closes();
        let sma50 = sma(&close, 50);
        let sma250 = sma(&close, 250);

        let (last_sma50, last_sma250) = match (sma50.last(), sma250.last()) {
            (Some(&s50), Some(&s250)) if !s50.is_nan() && !s250.is_nan() => (s50, s250),
            _ => {
                return SubStrategySignal::new(self.name(), SignalStrength::Neutral, 0.0, self.weight)
                    .with_meta("above_50", false)
                    .with_meta("above_250", false);
            }
        };

        let above_50 = confirmed_above(&close, &sma50);
        let below_50 = confirmed_below(&close, &sma50);
        let above_250 = confirmed_above(&close, &sma250);
        let below_250 = confirmed_below(&close, &sma250);

        let (signal, raw_score) = if above_50 && above_250 {
            (SignalStrength::StrongBull, 1.0)
        } else if !above_50 && above_250 {
            (SignalStrength::Bull, 0.3)
        } else if above_50 && !above_250 {
            (SignalStrength::Neutral, 0.1)
        } else {
            debug_assert!(below_50 || below_250 || (!above_50 && !above_250));
            (SignalStrength::StrongBear, -0.5)
        };

        SubStrategySignal::new(self.name(), signal, raw_score, self.weight)
            .with_meta("sma50", last_sma50)
            .with_meta("sma250", last_sma250)
            .with_meta("above_50", above_50)
            .with_meta("above_250", above_250)
    }
}

/// True when the last `CONFIRM_DAYS` closes all exceed `sma * (1 + hysteresis)`.
fn confirmed_above(close: &[f64], sma: &[f64]) -> bool {
    tail_holds(close, sma, |price, threshold| price > threshold, 1.0 + HYSTERESIS_PCT)
}

/// True when the last `CONFIRM_DAYS` closes all fall below `sma * (1 - hysteresis)`.
fn confirmed_below(close: &[f64], sma: &[f64]) -> bool {
    tail_holds(close, sma, |price, threshold| price < threshold, 1.0 - HYSTERESIS_PCT)
}

fn tail_holds(
    close: &[f64],
    sma: &[f64],
    cmp: impl Fn(f64, f64) -> bool,
    hysteresis_mult: f64,
) -> bool {
    let n = close.len();
    if n < CONFIRM_DAYS || sma.len() < CONFIRM_DAYS {
        return false;
    }
    (n - CONFIRM_DAYS..n).all(|i| {
        !sma[i].is_nan() && cmp(close[i], sma[i] * hysteresis_mult)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn history_with_closes(closes: &[f64]) -> BarHistory {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        BarHistory::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| crate::models::Bar {
                    date: base + chrono::Duration::days(i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1000,
                })
                .collect(),
        )
    }

    #[test]
    fn insufficient_history_is_neutral() {
        let h = history_with_closes(&vec![100.0; 100]);
        let sig = S1PrimaryTrend::default().compute(&h);
        assert_eq!(sig.signal, SignalStrength::Neutral);
        assert_eq!(sig.raw_score, 0.0);
    }

    #[test]
    fn strong_uptrend_is_strong_bull() {
        // Monotone ramp keeps sma50 and sma250 both well below the latest
        // closes by more than the hysteresis band.
        let closes: Vec<f64> = (0..300).map(|i| 100.0 + i as f64 * 0.5).collect();
        let h = history_with_closes(&closes);
        let sig = S1PrimaryTrend::default().compute(&h);
        assert_eq!(sig.signal, SignalStrength::StrongBull);
        assert_eq!(sig.raw_score, 1.0);
    }

    #[test]
    fn strong_downtrend_is_strong_bear() {
        let closes: Vec<f64> = (0..300).map(|i| 400.0 - i as f64 * 0.5).collect();
        let h = history_with_closes(&closes);
        let sig = S1PrimaryTrend::default().compute(&h);
        assert_eq!(sig.signal, SignalStrength::StrongBear);
        assert_eq!(sig.raw_score, -0.5);
    }
}
