//! S2 — Intermediate trend: 20/100-day SMA crossover plus price-vs-SMA20.

use crate::indicators::sma;
use crate::models::{BarHistory, SignalStrength, SubStrategySignal};
use crate::strategy::{last_defined, SubStrategy};

const DEFAULT_WEIGHT: f64 = 0.15;

pub struct S2IntermediateTrend {
    pub weight: f64,
}

impl Default for S2IntermediateTrend {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl SubStrategy for S2IntermediateTrend {
    fn name(&self) -> &'static str {
        "S2_IntermediateTrend"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn compute(&self, history: &BarHistory) -> SubStrategySignal {
        let close = history.closes();
        let sma20 = sma(&close, 20);
        let sma100 = sma(&close, 100);

        let (last_close, last_sma20, last_sma100) = match (
            last_defined(&close),
            last_defined(&sma20),
            last_defined(&sma100),
        ) {
            (Some(c), Some(s20), Some(s100)) => (c, s20, s100),
            _ => {
                return SubStrategySignal::new(self.name(), SignalStrength::Neutral, 0.0, self.weight)
            }
        };

        let above_20 = last_close > last_sma20;
        let sma20_above_100 = last_sma20 > last_sma100;

        let (signal, raw_score) = if above_20 && sma20_above_100 {
            (SignalStrength::StrongBull, 1.0)
        } else if above_20 && !sma20_above_100 {
            (SignalStrength::Bull, 0.3)
        } else if !above_20 && sma20_above_100 {
            (SignalStrength::Neutral, 0.0)
        } else {
            (SignalStrength::Bear, -0.5)
        };

        SubStrategySignal::new(self.name(), signal, raw_score, self.weight)
            .with_meta("sma20", last_sma20)
            .with_meta("sma100", last_sma100)
            .with_meta("above_20", above_20)
            .with_meta("sma20_above_100", sma20_above_100)
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
        let closes: Vec<f64> = (0..150).map(|i| 100.0 + i as f64 * 0.3).collect();
        let sig = S2IntermediateTrend::default().compute(&history_with_closes(&closes));
        assert_eq!(sig.signal, SignalStrength::StrongBull);
    }

    #[test]
    fn downtrend_is_bear() {
        let closes: Vec<f64> = (0..150).map(|i| 300.0 - i as f64 * 0.3).collect();
        let sig = S2IntermediateTrend::default().compute(&history_with_closes(&closes));
        assert_eq!(sig.signal, SignalStrength::Bear);
    }
}
