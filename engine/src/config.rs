//! config.rs — Centralised tunables, loaded from the environment.
//!
//! Every numeric default named in the spec (volatility target, crash-
//! sprint parameters, risk-free rate, sub-strategy weights, starting
//! capital, warmup length) lives here so an operator can override one
//! without touching source. Loading happens once per run; the engine and
//! backtest runner borrow `&EngineConfig`.

use anyhow::Result;
use std::env;

/// Production default weight for each sub-strategy (spec §4.2). The sum
/// is 1.0; `EngineConfig` does not enforce that on override, matching
/// the "configuration violation is a warning, not a rejection" rule in
/// spec §7.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyWeights {
    pub s1_primary_trend: f64,
    pub s2_intermediate_trend: f64,
    pub s3_short_term_trend: f64,
    pub s4_trend_strength: f64,
    pub s5_momentum_velocity: f64,
    pub s6_mean_rev_bollinger: f64,
    pub s7_volatility_regime: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            s1_primary_trend: 0.25,
            s2_intermediate_trend: 0.15,
            s3_short_term_trend: 0.10,
            s4_trend_strength: 0.10,
            s5_momentum_velocity: 0.15,
            s6_mean_rev_bollinger: 0.15,
            s7_volatility_regime: 0.10,
        }
    }
}

impl StrategyWeights {
    pub fn sum(&self) -> f64 {
        self.s1_primary_trend
            + self.s2_intermediate_trend
            + self.s3_short_term_trend
            + self.s4_trend_strength
            + self.s5_momentum_velocity
            + self.s6_mean_rev_bollinger
            + self.s7_volatility_regime
    }

    fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            s1_primary_trend: parse_env("WEIGHT_S1", d.s1_primary_trend)?,
            s2_intermediate_trend: parse_env("WEIGHT_S2", d.s2_intermediate_trend)?,
            s3_short_term_trend: parse_env("WEIGHT_S3", d.s3_short_term_trend)?,
            s4_trend_strength: parse_env("WEIGHT_S4", d.s4_trend_strength)?,
            s5_momentum_velocity: parse_env("WEIGHT_S5", d.s5_momentum_velocity)?,
            s6_mean_rev_bollinger: parse_env("WEIGHT_S6", d.s6_mean_rev_bollinger)?,
            s7_volatility_regime: parse_env("WEIGHT_S7", d.s7_volatility_regime)?,
        })
    }
}

/// Every tunable constant the combiner, backtest runner, and metrics
/// module consult (spec §4.3, §4.5, §4.6). Values here are the
/// production defaults from the spec; override via environment variable
/// (see the `*_ENV` names below) when experimenting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Annualized volatility target driving the leveraged-long allocation.
    pub target_vol: f64,
    /// Whether the SQQQ crash-sprint override is active at all.
    pub sqqq_sprint_enabled: bool,
    /// Max trading days the crash sprint stays open once triggered.
    pub sqqq_sprint_max_days: u32,
    /// Minimum vol20 required to engage the crash sprint.
    pub sqqq_sprint_vol_min: f64,
    /// Inverse-ETF allocation fraction while the sprint is active.
    pub sqqq_sprint_pct: f64,
    /// Annualized risk-free rate used by Sharpe/Sortino.
    pub risk_free_rate: f64,
    /// Trading days per year, for annualization.
    pub trading_days_per_year: f64,
    /// Default starting capital for a fresh backtest.
    pub initial_capital: f64,
    /// Default warmup length, in trading days, before evaluation begins.
    pub warmup_days: usize,
    /// Per-sub-strategy weights (spec §4.2 defaults).
    pub strategy_weights: StrategyWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_vol: 0.20,
            sqqq_sprint_enabled: true,
            sqqq_sprint_max_days: 15,
            sqqq_sprint_vol_min: 0.25,
            sqqq_sprint_pct: 0.30,
            risk_free_rate: 0.04,
            trading_days_per_year: 252.0,
            initial_capital: 100_000.0,
            warmup_days: 260,
            strategy_weights: StrategyWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables (after `.env`,
    /// loaded once, missing file ignored). Any variable not set falls
    /// back to the spec's production default.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let d = Self::default();

        Ok(Self {
            target_vol: parse_env("TARGET_VOL", d.target_vol)?,
            sqqq_sprint_enabled: parse_env("SQQQ_SPRINT_ENABLED", d.sqqq_sprint_enabled)?,
            sqqq_sprint_max_days: parse_env("SQQQ_SPRINT_MAX_DAYS", d.sqqq_sprint_max_days)?,
            sqqq_sprint_vol_min: parse_env("SQQQ_SPRINT_VOL_MIN", d.sqqq_sprint_vol_min)?,
            sqqq_sprint_pct: parse_env("SQQQ_SPRINT_PCT", d.sqqq_sprint_pct)?,
            risk_free_rate: parse_env("RISK_FREE_RATE", d.risk_free_rate)?,
            trading_days_per_year: parse_env("TRADING_DAYS_PER_YEAR", d.trading_days_per_year)?,
            initial_capital: parse_env("INITIAL_CAPITAL", d.initial_capital)?,
            warmup_days: parse_env("WARMUP_DAYS", d.warmup_days)?,
            strategy_weights: StrategyWeights::from_env()?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}
