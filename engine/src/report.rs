//! Persisted backtest-result document (spec §6 "Persisted artifacts").
//!
//! The core performs no file I/O; this module only defines the
//! serializable shape a driver would write to disk or hand to an API
//! response. Dates serialize as ISO-8601 `YYYY-MM-DD` (via `chrono`'s
//! `Display`/`Serialize` impl for `NaiveDate`), decimals as strings (via
//! `rust_decimal`'s `serde-str` feature), and every other numeric metric
//! as a JSON number.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::backtest::{BacktestConfig, BacktestResult};
use crate::metrics::{BacktestMetrics, MonthlyReturn};
use crate::models::Side;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: Decimal,
    pub warmup_days: usize,
}

impl From<&BacktestConfig> for ReportConfig {
    fn from(c: &BacktestConfig) -> Self {
        Self {
            start_date: c.start_date,
            end_date: c.end_date,
            initial_capital: c.initial_capital,
            warmup_days: c.warmup_days,
        }
    }
}

/// One row of the persisted trade ledger. Buy legs carry neither `pnl`
/// nor `duration_days`; sell legs (completed round trips) carry both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRow {
    pub date: NaiveDate,
    pub symbol: &'static str,
    pub side: Side,
    pub shares: i64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<i64>,
}

/// The complete persisted document for one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub config: ReportConfig,
    pub metrics: BacktestMetrics,
    pub monthly_returns: Vec<MonthlyReturn>,
    pub trade_count: usize,
    pub snapshot_count: usize,
    pub trades: Vec<TradeRow>,
}

impl BacktestReport {
    pub fn from_result(result: &BacktestResult) -> Self {
        let trades: Vec<TradeRow> = result
            .trades
            .iter()
            .map(|t| TradeRow {
                date: t.date,
                symbol: t.symbol,
                side: t.side,
                shares: t.shares,
                price: t.price,
                pnl: t.pnl,
                duration_days: t.duration_days,
            })
            .collect();

        Self {
            config: ReportConfig::from(&result.config),
            metrics: result.metrics,
            monthly_returns: result.monthly_returns.clone(),
            trade_count: trades.len(),
            snapshot_count: result.daily_snapshots.len(),
            trades,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{BacktestConfig, BacktestRunner};
    use crate::models::Bar;
    use chrono::Duration;

    fn flat_bars(start: NaiveDate, days: i64, price: f64) -> crate::models::BarHistory {
        crate::models::BarHistory::new(
            (0..days)
                .map(|i| Bar {
                    date: start + Duration::days(i),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: 1_000_000,
                })
                .collect(),
        )
    }

    #[test]
    fn round_trips_a_real_result_through_json() {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let ndx = flat_bars(start, 300, 10_000.0);
        let tqqq = flat_bars(start, 300, 50.0);
        let sqqq = flat_bars(start, 300, 20.0);
        let end = start + Duration::days(299);

        let mut runner = BacktestRunner::new(BacktestConfig::new(start, end));
        let result = runner.run(&ndx, &tqqq, &sqqq).expect("valid history");
        let report = BacktestReport::from_result(&result);

        assert_eq!(report.snapshot_count, result.daily_snapshots.len());
        assert_eq!(report.trade_count, report.trades.len());

        let json = report.to_json_pretty().expect("serializable");
        assert!(json.contains("\"start_date\""));
        let parsed: BacktestReport = serde_json::from_str(&json).expect("round-trips");
        assert_eq!(parsed.snapshot_count, report.snapshot_count);
    }
}
