//! Sub-strategy set (S1–S7): seven deterministic functions over the index
//! bar history, each emitting a discrete bucket, a continuous score, a
//! fixed weight, and diagnostic metadata (spec §4.2).
//!
//! Sub-strategies are a closed set of types behind one trait rather than
//! an inheritance hierarchy; the combiner looks them up by the stable
//! `strategy_name` prefix (`S1_`..`S7_`), never by position.

mod s1_primary_trend;
mod s2_intermediate_trend;
mod s3_short_term_trend;
mod s4_trend_strength;
mod s5_momentum_velocity;
mod s6_mean_rev_bollinger;
mod s7_volatility_regime;

pub use s1_primary_trend::S1PrimaryTrend;
pub use s2_intermediate_trend::S2IntermediateTrend;
pub use s3_short_term_trend::S3ShortTermTrend;
pub use s4_trend_strength::S4TrendStrength;
pub use s5_momentum_velocity::S5MomentumVelocity;
pub use s6_mean_rev_bollinger::S6MeanRevBollinger;
pub use s7_volatility_regime::S7VolatilityRegime;

use crate::config::StrategyWeights;
use crate::models::{BarHistory, SubStrategySignal};

/// A single sub-strategy: reads the index history and emits one signal.
/// `name()` is the stable prefix the combiner uses for metadata lookup
/// (e.g. `"S7_VolatilityRegime"` is matched by its `"S7_"` prefix).
pub trait SubStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f64;
    fn compute(&self, history: &BarHistory) -> SubStrategySignal;
}

/// The full S1–S7 set in declaration order, at the spec's production
/// default weights. Order is load-bearing: the strategy engine (C4)
/// collects signals in this order and iteration order must never vary
/// run to run.
pub fn default_strategies() -> Vec<Box<dyn SubStrategy>> {
    strategies_with_weights(&StrategyWeights::default())
}

/// The full S1–S7 set at the given (possibly operator-overridden)
/// weights, same declaration order as [`default_strategies`].
pub fn strategies_with_weights(weights: &StrategyWeights) -> Vec<Box<dyn SubStrategy>> {
    vec![
        Box::new(S1PrimaryTrend {
            weight: weights.s1_primary_trend,
        }),
        Box::new(S2IntermediateTrend {
            weight: weights.s2_intermediate_trend,
        }),
        Box::new(S3ShortTermTrend {
            weight: weights.s3_short_term_trend,
        }),
        Box::new(S4TrendStrength {
            weight: weights.s4_trend_strength,
        }),
        Box::new(S5MomentumVelocity {
            weight: weights.s5_momentum_velocity,
        }),
        Box::new(S6MeanRevBollinger {
            weight: weights.s6_mean_rev_bollinger,
        }),
        Box::new(S7VolatilityRegime {
            weight: weights.s7_volatility_regime,
        }),
    ]
}

/// Last value of a warmup-sensitive series, or `None` if undefined (NaN)
/// or the series is empty. Centralises the "NaN collapses to the
/// conservative neutral bucket" rule from spec §7.
pub(crate) fn last_defined(series: &[f64]) -> Option<f64> {
    match series.last() {
        Some(v) if !v.is_nan() => Some(*v),
        _ => None,
    }
}
