//! S5 — Momentum velocity: 14-day ROC smoothed with a 3-day SMA, then its
//! day-over-day change (velocity). A sharp 5-day drawdown adds a bearish
//! penalty on top of the base bucket.

use crate::indicators::{roc, sma};
use crate::models::{BarHistory, SignalStrength, SubStrategySignal};
use crate::strategy::{last_defined, SubStrategy};

const DEFAULT_WEIGHT: f64 = 0.15;
const CRASH_ROC5_THRESHOLD: f64 = -5.0;
const CRASH_PENALTY: f64 = -0.2;

pub struct S5MomentumVelocity {
    pub weight: f64,
}

impl Default for S5MomentumVelocity {
    fn default() -> Self {
        Self {
            weight: DEFAULT_WEIGHT,
        }
    }
}

impl SubStrategy for S5MomentumVelocity {
    fn name(&self) -> &'static str {
        "S5_MomentumVelocity"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn compute(&self, history: &BarHistory) -> SubStrategySignal {
        let close = history.closes();
        let roc14 = roc(&close, 14);
        let smoothed = sma(&roc14, 3);

        let velocity: Vec<f64> = std::iter::once(f64::NAN)
            .chain(smoothed.windows(2).map(|w| w[1] - w[0]))
            .collect();

        let roc5 = roc(&close, 5);

        let (last_roc, last_vel, last_roc5) = match (
            last_defined(&smoothed),
            last_defined(&velocity),
            last_defined(&roc5),
        ) {
            (Some(r), Some(v), Some(r5)) => (r, v, r5),
            _ => return SubStrategySignal::new(self.name(), SignalStrength::Neutral, 0.0, self.weight),
        };

        let (mut signal, mut raw_score) = if last_roc > 0.0 && last_vel > 0.0 {
            (SignalStrength::StrongBull, 1.0)
        } else if last_roc > 0.0 && last_vel <= 0.0 {
            (SignalStrength::Bull, 0.3)
        } else if last_roc <= 0.0 && last_vel > 0.0 {
            (SignalStrength::Neutral, 0.0)
        } else {
            (SignalStrength::Bear, -0.7)
        };

        let crash_applied = last_roc5 < CRASH_ROC5_THRESHOLD;
        if crash_applied {
            raw_score = (raw_score + CRASH_PENALTY).max(-1.0);
            if raw_score <= -0.5 {
                signal = SignalStrength::StrongBear;
            } else if raw_score < 0.0 {
                signal = SignalStrength::Bear;
            }
        }

        SubStrategySignal::new(self.name(), signal, raw_score, self.weight)
            .with_meta("smoothed_roc14", last_roc)
            .with_meta("velocity", last_vel)
            .with_meta("roc5", last_roc5)
            .with_meta("crash_penalty_applied", crash_applied)
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
        let h = history_with_closes(&vec![100.0; 5]);
        let sig = S5MomentumVelocity::default().compute(&h);
        assert_eq!(sig.signal, SignalStrength::Neutral);
        assert_eq!(sig.raw_score, 0.0);
    }

    #[test]
    fn accelerating_uptrend_is_strong_bull() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        let sig = S5MomentumVelocity::default().compute(&history_with_closes(&closes));
        assert_eq!(sig.signal, SignalStrength::StrongBull);
    }

    #[test]
    fn sharp_drop_triggers_crash_penalty() {
        let mut closes: Vec<f64> = vec![100.0; 30];
        closes.extend([94.0, 90.0, 86.0, 82.0, 78.0]);
        let sig = S5MomentumVelocity::default().compute(&history_with_closes(&closes));
        assert_eq!(sig.meta_bool("crash_penalty_applied"), Some(true));
        assert!(sig.raw_score < 0.0);
    }
}
