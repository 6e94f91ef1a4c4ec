//! S3 — Short-term trend: 10/30-day SMA crossover plus price-vs-SMA10.

use crate::indicators::sma;
use crate::models::{BarHistory, SignalStrength, SubStrategySignal};
use crate::strategy::{last_defined, SubStrategy};

const DEFAULT_WEIGHT: f64 = 0.10;

pub struct S3ShortTermTrend {
    pub weight: f64,
}

impl Default for S3ShortTermTrend {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl SubStrategy for S3ShortTermTrend {
    fn name(&self) -> &'static str {
        "S3_ShortTermTrend"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn compute(&self, history: &BarHistory) -> SubStrategySignal {
        let close = history.closes();
        let sma10 = sma(&close, 10);
        let sma30 = sma(&close, 30);

        let (last_close, last_sma10, last_sma30) = match (
            last_defined(&close),
            last_defined(&sma10),
            last_defined(&sma30),
        ) {
            (Some(c), Some(s10), Some(s30)) => (c, s10, s30),
            _ => {
                return SubStrategySignal::new(self.name(), SignalStrength::Neutral, 0.0, self.weight)
            }
        };

        let sma10_above_30 = last_sma10 > last_sma30;
        let above_sma10 = last_close > last_sma10;

        let (signal, raw_score) = if sma10_above_30 && above_sma10 {
            (SignalStrength::StrongBull, 1.0)
        } else if sma10_above_30 && !above_sma10 {
            (SignalStrength::Bull, 0.5)
        } else if !sma10_above_30 && above_sma10 {
            (SignalStrength::Neutral, 0.0)
        } else {
            (SignalStrength::Bear, -0.3)
        };

        SubStrategySignal::new(self.name(), signal, raw_score, self.weight)
            .with_meta("sma10", last_sma10)
            .with_meta("sma30", last_sma30)
            .with_meta("sma10_above_30", sma10_above_30)
            .with_meta("above_sma10", above_sma10)
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
    fn uptrend_is_strong_bull() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let sig = S3ShortTermTrend::default().compute(&history_with_closes(&closes));
        assert_eq!(sig.signal, SignalStrength::StrongBull);
    }
}
