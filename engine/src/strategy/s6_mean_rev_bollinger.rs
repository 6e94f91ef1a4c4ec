//! S6 — Bollinger mean reversion: 20-day %B, filtered by the 200-day SMA
//! macro trend.

use crate::indicators::{bollinger_bands, sma};
use crate::models::{BarHistory, SignalStrength, SubStrategySignal};
use crate::strategy::{last_defined, SubStrategy};

const DEFAULT_WEIGHT: f64 = 0.15;
const BB_PERIOD: usize = 20;
const BB_STD_MULT: f64 = 2.0;

pub struct S6MeanRevBollinger {
    pub weight: f64,
}

impl Default for S6MeanRevBollinger {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl SubStrategy for S6MeanRevBollinger {
    fn name(&self) -> &'static str {
        "S6_MeanRevBollinger"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn compute(&self, history: &BarHistory) -> SubStrategySignal {
        let close = history.closes();
        let (_, _, pct_b) = bollinger_bands(&close, BB_PERIOD, BB_STD_MULT);
        let sma200 = sma(&close, 200);

        let (last_pctb, last_close, last_sma200) = match (
            last_defined(&pct_b),
            last_defined(&close),
            last_defined(&sma200),
        ) {
            (Some(p), Some(c), Some(s)) => (p, c, s),
            _ => {
                return SubStrategySignal::new(self.name(), SignalStrength::Neutral, 0.0, self.weight)
                    .with_meta("macro_bullish", false)
            }
        };

        let macro_bullish = last_close > last_sma200;

        let (signal, raw_score) = if last_pctb < 0.05 {
            (SignalStrength::Bull, 0.5)
        } else if last_pctb < 0.2 && macro_bullish {
            (SignalStrength::StrongBull, 1.0)
        } else if last_pctb < 0.2 && !macro_bullish {
            (SignalStrength::Neutral, 0.0)
        } else if (0.2..=0.5).contains(&last_pctb) && !macro_bullish {
            (SignalStrength::Bear, -0.5)
        } else if (0.3..=0.8).contains(&last_pctb) && macro_bullish {
            (SignalStrength::Bull, 0.8)
        } else if last_pctb > 0.95 && macro_bullish {
            (SignalStrength::Bull, 0.3)
        } else if last_pctb > 0.95 && !macro_bullish {
            (SignalStrength::Bear, -0.3)
        } else {
            (SignalStrength::Neutral, 0.0)
        };

        SubStrategySignal::new(self.name(), signal, raw_score, self.weight)
            .with_meta("pct_b", last_pctb)
            .with_meta("sma200", last_sma200)
            .with_meta("macro_bullish", macro_bullish)
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
        let h = history_with_closes(&vec![100.0; 50]);
        let sig = S6MeanRevBollinger::default().compute(&h);
        assert_eq!(sig.signal, SignalStrength::Neutral);
    }

    #[test]
    fn dip_in_uptrend_is_strong_bull() {
        let mut closes: Vec<f64> = (0..220).map(|i| 100.0 + i as f64 * 0.2).collect();
        let last = *closes.last().unwrap();
        closes.push(last * 0.90);
        let sig = S6MeanRevBollinger::default().compute(&history_with_closes(&closes));
        assert_eq!(sig.meta_bool("macro_bullish"), Some(true));
        assert!(sig.raw_score > 0.0);
    }
}
