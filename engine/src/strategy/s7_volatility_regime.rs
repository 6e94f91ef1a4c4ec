//! S7 — Volatility regime: ratio of 20-day to 60-day annualized realized
//! volatility, filtered by the 100-day SMA trend.

use crate::indicators::{realized_volatility, sma};
use crate::models::{BarHistory, SignalStrength, SubStrategySignal};
use crate::strategy::{last_defined, SubStrategy};

const DEFAULT_WEIGHT: f64 = 0.10;

pub struct S7VolatilityRegime {
    pub weight: f64,
}

impl Default for S7VolatilityRegime {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl SubStrategy for S7VolatilityRegime {
    fn name(&self) -> &'static str {
        "S7_VolatilityRegime"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn compute(&self, history: &BarHistory) -> SubStrategySignal {
        let close = history.closes();
        let vol20 = realized_volatility(&close, 20);
        let vol60 = realized_volatility(&close, 60);
        let sma100 = sma(&close, 100);

        let (last_vol20, last_vol60, last_close, last_sma100) = match (
            last_defined(&vol20),
            last_defined(&vol60),
            last_defined(&close),
            last_defined(&sma100),
        ) {
            (Some(v20), Some(v60), Some(c), Some(s100)) => (v20, v60, c, s100),
            _ => return SubStrategySignal::new(self.name(), SignalStrength::Neutral, 0.0, self.weight),
        };

        let vol_ratio = if last_vol60 != 0.0 {
            last_vol20 / last_vol60
        } else {
            1.0
        };
        let bullish = last_close > last_sma100;

        let (signal, raw_score) = if vol_ratio > 2.0 {
            (SignalStrength::Bear, -0.3)
        } else if vol_ratio > 1.5 && !bullish {
            (SignalStrength::Bear, -0.5)
        } else if vol_ratio > 1.5 && bullish {
            (SignalStrength::Neutral, 0.0)
        } else if (0.8..=1.2).contains(&vol_ratio) && bullish {
            (SignalStrength::Bull, 0.5)
        } else if vol_ratio < 0.8 && bullish {
            (SignalStrength::StrongBull, 1.0)
        } else if vol_ratio < 0.8 && !bullish {
            (SignalStrength::Bear, -0.2)
        } else {
            (SignalStrength::Neutral, 0.0)
        };

        SubStrategySignal::new(self.name(), signal, raw_score, self.weight)
            .with_meta("vol20", last_vol20)
            .with_meta("vol60", last_vol60)
            .with_meta("vol_ratio", vol_ratio)
            .with_meta("sma100", last_sma100)
            .with_meta("bullish", bullish)
    }
}
