//! S4 — Trend strength: 60-day OLS slope of close, z-scored against its
//! own 252-day distribution, cross-referenced with the 200-day SMA.

use crate::indicators::{linear_regression_slope, sma, zscore};
use crate::models::{BarHistory, SignalStrength, SubStrategySignal};
use crate::strategy::{last_defined, SubStrategy};

const DEFAULT_WEIGHT: f64 = 0.10;
const SLOPE_WINDOW: usize = 60;
const Z_WINDOW: usize = 252;
const SMA_WINDOW: usize = 200;

pub struct S4TrendStrength {
    pub weight: f64,
}

impl Default for S4TrendStrength {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl SubStrategy for S4TrendStrength {
    fn name(&self) -> &'static str {
        "S4_TrendStrength"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn compute(&self, history: &BarHistory) -> SubStrategySignal {
        let close = history.closes();
        let slope = linear_regression_slope(&close, SLOPE_WINDOW);
        let slope_z = zscore(&slope, Z_WINDOW);
        let sma200 = sma(&close, SMA_WINDOW);

        let (last_close, last_slope, last_z, last_sma200) = match (
            last_defined(&close),
            last_defined(&slope),
            last_defined(&slope_z),
            last_defined(&sma200),
        ) {
            (Some(c), Some(s), Some(z), Some(s200)) => (c, s, z, s200),
            _ => {
                return SubStrategySignal::new(self.name(), SignalStrength::Neutral, 0.0, self.weight)
                    .with_meta("above_200", false)
                    .with_meta("sma200", 0.0);
            }
        };

        let above_200 = last_close > last_sma200;

        let (signal, raw_score) = if last_slope > 0.0 && last_z > 0.5 && above_200 {
            (SignalStrength::StrongBull, 1.0)
        } else if last_slope > 0.0 && (0.0..=0.5).contains(&last_z) {
            (SignalStrength::Bull, 0.5)
        } else if last_slope > 0.0 && !above_200 {
            (SignalStrength::Neutral, 0.0)
        } else if last_slope < 0.0 && last_z < -0.5 {
            (SignalStrength::Bear, -0.5)
        } else if last_slope < 0.0 && (-0.5..0.0).contains(&last_z) {
            (SignalStrength::Bear, -0.2)
        } else {
            (SignalStrength::Neutral, 0.0)
        };

        SubStrategySignal::new(self.name(), signal, raw_score, self.weight)
            .with_meta("slope", last_slope)
            .with_meta("slope_z", last_z)
            .with_meta("sma200", last_sma200)
            .with_meta("above_200", above_200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::models::Bar;

    fn history_with_closes(closes: &[f64]) -> BarHistory {
        let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        BarHistory::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
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
        let sig = S4TrendStrength::default().compute(&h);
        assert_eq!(sig.signal, SignalStrength::Neutral);
        assert_eq!(sig.raw_score, 0.0);
    }

    #[test]
    fn flat_series_yields_zero_slope_neutral() {
        let closes = vec![100.0; 400];
        let sig = S4TrendStrength::default().compute(&history_with_closes(&closes));
        assert_eq!(sig.raw_score, 0.0);
    }
}
