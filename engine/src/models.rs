//! Shared domain types for the White Light strategy engine.
//!
//! Mirrors the data model in spec §3: `Bar`, the per-sub-strategy
//! `SubStrategySignal`, `TargetAllocation`, `DailySnapshot`, trade records,
//! and the engine-internal open-position ledger.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One day's OHLCV record. Dates carry no time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// An ordered, date-unique bar series. Construction does not validate;
/// see [`crate::validation::validate_history`] for the input-shape checks.
#[derive(Debug, Clone, Default)]
pub struct BarHistory {
    bars: Vec<Bar>,
}

impl BarHistory {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Left-closed, right-closed slice ending on (and including) `date`.
    /// Returns an empty history if `date` predates the first bar.
    pub fn slice_through(&self, date: NaiveDate) -> BarHistory {
        let end = self
            .bars
            .iter()
            .rposition(|b| b.date <= date)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        BarHistory::new(self.bars[..end].to_vec())
    }
}

/// Discrete strength bucket emitted by every sub-strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    StrongBear,
    Bear,
    Neutral,
    Bull,
    StrongBull,
}

/// Diagnostic metadata value: either a number or a boolean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Number(f64),
    Bool(bool),
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

/// Output of a single sub-strategy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubStrategySignal {
    pub strategy_name: &'static str,
    pub signal: SignalStrength,
    pub raw_score: f64,
    pub weight: f64,
    pub metadata: HashMap<&'static str, MetaValue>,
}

impl SubStrategySignal {
    pub fn new(
        strategy_name: &'static str,
        signal: SignalStrength,
        raw_score: f64,
        weight: f64,
    ) -> Self {
        Self {
            strategy_name,
            signal,
            raw_score: raw_score.clamp(-1.0, 1.0),
            weight,
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: &'static str, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key, value.into());
        self
    }

    pub fn meta_number(&self, key: &str) -> Option<f64> {
        match self.metadata.get(key) {
            Some(MetaValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn meta_bool(&self, key: &str) -> Option<bool> {
        match self.metadata.get(key) {
            Some(MetaValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Final output of the strategy engine for a single trading day.
/// Invariant: `tqqq_pct + sqqq_pct + cash_pct` is within 1e-2 of 1, and at
/// most one of `tqqq_pct`/`sqqq_pct` is strictly positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAllocation {
    pub tqqq_pct: Decimal,
    pub sqqq_pct: Decimal,
    pub cash_pct: Decimal,
    pub signals: Vec<SubStrategySignal>,
    pub composite_score: f64,
}

impl TargetAllocation {
    pub fn cash_only(signals: Vec<SubStrategySignal>, composite_score: f64) -> Self {
        Self {
            tqqq_pct: Decimal::ZERO,
            sqqq_pct: Decimal::ZERO,
            cash_pct: Decimal::ONE,
            signals,
            composite_score,
        }
    }
}

/// Side of a simulated order leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// One executed order leg. Sell legs carry realized PnL and holding
/// duration; buy-only legs are open-position events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub symbol: &'static str,
    pub side: Side,
    pub shares: i64,
    pub price: f64,
    pub pnl: Option<f64>,
    pub duration_days: Option<i64>,
}

/// Engine-internal record of an open position's entry date and
/// volume-weighted average entry price.
#[derive(Debug, Clone, Copy)]
pub struct OpenPosition {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub shares: i64,
}

/// State of the simulated portfolio at the close of one trading day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub target: TargetAllocation,
    pub tqqq_shares: i64,
    pub sqqq_shares: i64,
    pub cash: Decimal,
    pub portfolio_value: Decimal,
    pub tqqq_price: f64,
    pub sqqq_price: f64,
    pub composite_score: f64,
}
