//! C4 — Strategy engine: runs every registered sub-strategy over one bar
//! slice and feeds the signal vector plus history to the combiner.

use tracing::{info, warn};

use crate::combiner::SignalCombiner;
use crate::config::EngineConfig;
use crate::models::{BarHistory, TargetAllocation};
use crate::strategy::{default_strategies, strategies_with_weights, SubStrategy};

const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Orchestrates S1–S7 against one day's bar history and hands the signal
/// vector to the combiner. Owns the combiner's state for the lifetime of
/// one run; the engine itself has no state beyond that.
pub struct StrategyEngine {
    strategies: Vec<Box<dyn SubStrategy>>,
    combiner: SignalCombiner,
}

impl StrategyEngine {
    pub fn new(strategies: Vec<Box<dyn SubStrategy>>, combiner: SignalCombiner) -> Self {
        let total_weight: f64 = strategies.iter().map(|s| s.weight()).sum();
        if (total_weight - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            warn!(total_weight, "sub-strategy weights do not sum to ~1.0");
        }
        Self {
            strategies,
            combiner,
        }
    }

    /// Builds an engine over the default S1–S7 set with a fresh combiner.
    pub fn with_default_strategies() -> Self {
        Self::new(default_strategies(), SignalCombiner::new())
    }

    /// Builds an engine at the given (possibly operator-overridden)
    /// tunables: sub-strategy weights feed S1–S7, the rest feed the
    /// combiner.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::new(
            strategies_with_weights(&config.strategy_weights),
            SignalCombiner::with_config(config),
        )
    }

    /// Evaluates every sub-strategy against `history` and returns the
    /// combined target allocation. `history` must carry enough bars for
    /// the longest look-back window (250+ for S1's primary trend).
    pub fn evaluate(&mut self, history: &BarHistory) -> TargetAllocation {
        let signals: Vec<_> = self
            .strategies
            .iter()
            .map(|strat| {
                let signal = strat.compute(history);
                info!(
                    strategy = signal.strategy_name,
                    signal = ?signal.signal,
                    raw_score = signal.raw_score,
                    weight = signal.weight,
                    "sub-strategy evaluated"
                );
                signal
            })
            .collect();

        self.combiner.combine(signals, history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::NaiveDate;

    fn flat_history(days: usize) -> BarHistory {
        let base = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        BarHistory::new(
            (0..days)
                .map(|i| Bar {
                    date: base + chrono::Duration::days(i as i64),
                    open: 100.0,
                    high: 100.0,
                    low: 100.0,
                    close: 100.0,
                    volume: 1_000_000,
                })
                .collect(),
        )
    }

    #[test]
    fn evaluate_returns_a_well_formed_allocation() {
        let mut engine = StrategyEngine::with_default_strategies();
        let history = flat_history(300);
        let alloc = engine.evaluate(&history);
        assert_eq!(alloc.signals.len(), 7);
        let total = alloc.tqqq_pct + alloc.sqqq_pct + alloc.cash_pct;
        assert!((total - rust_decimal::Decimal::ONE).abs() < rust_decimal::Decimal::new(1, 2));
    }
}
