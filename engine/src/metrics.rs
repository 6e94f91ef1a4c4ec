//! C6 — Performance metrics computed from a completed backtest's daily
//! snapshots and trade ledger: return/risk statistics, trade statistics,
//! and a monthly returns table.

use chrono::Datelike;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::models::{DailySnapshot, Side, TradeRecord};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const RISK_FREE_RATE: f64 = 0.04;

/// Every performance statistic produced from one backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_trade_duration: f64,
    pub avg_winning_trade: f64,
    pub avg_losing_trade: f64,
    pub total_trades: usize,
    pub trading_days: usize,
}

impl Default for BacktestMetrics {
    fn default() -> Self {
        Self {
            total_return: 0.0,
            annual_return: 0.0,
            max_drawdown: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            win_rate: 0.0,
            profit_factor: 0.0,
            avg_trade_duration: 0.0,
            avg_winning_trade: 0.0,
            avg_losing_trade: 0.0,
            total_trades: 0,
            trading_days: 0,
        }
    }
}

/// One row of the monthly-returns table: the percent return of
/// month-end portfolio value versus the prior month-end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
}

/// Cumulative total return: `(final / initial) - 1`.
pub fn total_return(portfolio_values: &[f64]) -> f64 {
    if portfolio_values.len() < 2 {
        return 0.0;
    }
    let initial = portfolio_values[0];
    let final_ = *portfolio_values.last().unwrap();
    if initial == 0.0 {
        return 0.0;
    }
    (final_ / initial) - 1.0
}

/// Compound Annual Growth Rate: `(final/initial)^(252/n_days) - 1`.
pub fn annual_return(portfolio_values: &[f64]) -> f64 {
    if portfolio_values.len() < 2 {
        return 0.0;
    }
    let initial = portfolio_values[0];
    let final_ = *portfolio_values.last().unwrap();
    let n_days = (portfolio_values.len() - 1) as f64;
    if initial <= 0.0 || final_ <= 0.0 || n_days == 0.0 {
        return 0.0;
    }
    (final_ / initial).powf(TRADING_DAYS_PER_YEAR / n_days) - 1.0
}

/// Maximum peak-to-valley drawdown, returned as a positive fraction
/// (e.g. a 25% drawdown is `0.25`).
pub fn max_drawdown(portfolio_values: &[f64]) -> f64 {
    if portfolio_values.len() < 2 {
        return 0.0;
    }
    let mut peak = portfolio_values[0];
    let mut worst = 0.0f64;
    for &v in portfolio_values {
        if v > peak {
            peak = v;
        }
        let dd = (v - peak) / peak;
        if dd < worst {
            worst = dd;
        }
    }
    -worst
}

fn daily_returns(portfolio_values: &[f64]) -> Vec<f64> {
    portfolio_values
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        0.0
    } else {
        data.iter().sum::<f64>() / data.len() as f64
    }
}

/// Sample standard deviation (ddof = 1), matching pandas' `.std()`.
fn sample_std(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let var = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    var.sqrt()
}

/// Annualized Sharpe ratio: `(mean_excess / std_excess) * sqrt(252)`.
pub fn sharpe_ratio(daily_rets: &[f64]) -> f64 {
    if daily_rets.len() < 2 {
        return 0.0;
    }
    let daily_rf = RISK_FREE_RATE / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = daily_rets.iter().map(|r| r - daily_rf).collect();
    let std = sample_std(&excess);
    if std == 0.0 {
        return 0.0;
    }
    (mean(&excess) / std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio: Sharpe with downside deviation in place of
/// total standard deviation.
pub fn sortino_ratio(daily_rets: &[f64]) -> f64 {
    if daily_rets.len() < 2 {
        return 0.0;
    }
    let daily_rf = RISK_FREE_RATE / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = daily_rets.iter().map(|r| r - daily_rf).collect();
    let downside: Vec<f64> = excess.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() || sample_std(&downside) == 0.0 {
        return 0.0;
    }
    let downside_std = (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
    (mean(&excess) / downside_std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Calmar ratio: CAGR / max drawdown, `0.0` if drawdown is zero.
pub fn calmar_ratio(portfolio_values: &[f64]) -> f64 {
    let cagr = annual_return(portfolio_values);
    let mdd = max_drawdown(portfolio_values);
    if mdd == 0.0 {
        0.0
    } else {
        cagr / mdd
    }
}

fn completed(trades: &[TradeRecord]) -> Vec<&TradeRecord> {
    trades
        .iter()
        .filter(|t| t.side == Side::Sell && t.pnl.is_some())
        .collect()
}

/// Fraction of completed round-trip trades with positive PnL.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    let completed = completed(trades);
    if completed.is_empty() {
        return 0.0;
    }
    let winners = completed.iter().filter(|t| t.pnl.unwrap() > 0.0).count();
    winners as f64 / completed.len() as f64
}

/// Gross profit / gross loss. `f64::INFINITY` with profits and no
/// losses, `0.0` with no completed trades.
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    let completed = completed(trades);
    if completed.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = completed.iter().filter_map(|t| t.pnl).filter(|&p| p > 0.0).sum();
    let gross_loss: f64 = completed
        .iter()
        .filter_map(|t| t.pnl)
        .filter(|&p| p < 0.0)
        .map(f64::abs)
        .sum();
    if gross_loss == 0.0 {
        if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        gross_profit / gross_loss
    }
}

/// Average number of trading days held per completed round-trip trade.
pub fn avg_trade_duration(trades: &[TradeRecord]) -> f64 {
    let durations: Vec<f64> = completed(trades)
        .iter()
        .filter_map(|t| t.duration_days)
        .map(|d| d as f64)
        .collect();
    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    }
}

pub fn avg_winning_trade(trades: &[TradeRecord]) -> f64 {
    let winners: Vec<f64> = completed(trades)
        .iter()
        .filter_map(|t| t.pnl)
        .filter(|&p| p > 0.0)
        .collect();
    if winners.is_empty() {
        0.0
    } else {
        winners.iter().sum::<f64>() / winners.len() as f64
    }
}

pub fn avg_losing_trade(trades: &[TradeRecord]) -> f64 {
    let losers: Vec<f64> = completed(trades)
        .iter()
        .filter_map(|t| t.pnl)
        .filter(|&p| p < 0.0)
        .collect();
    if losers.is_empty() {
        0.0
    } else {
        losers.iter().sum::<f64>() / losers.len() as f64
    }
}

/// Resamples daily snapshots to month-end portfolio value and returns the
/// month-over-month percent change, dropping the first (undefined) row.
pub fn monthly_returns(snapshots: &[DailySnapshot]) -> Vec<MonthlyReturn> {
    if snapshots.len() < 2 {
        return vec![];
    }

    let mut month_end: Vec<(i32, u32, f64)> = Vec::new();
    let mut current: Option<(i32, u32)> = None;
    for snap in snapshots {
        let key = (snap.date.year(), snap.date.month());
        let value: f64 = snap.portfolio_value.to_f64().unwrap_or(0.0);
        match current {
            Some(k) if k == key => {
                let last = month_end.last_mut().unwrap();
                last.2 = value;
            }
            _ => {
                month_end.push((key.0, key.1, value));
                current = Some(key);
            }
        }
    }

    month_end
        .windows(2)
        .map(|w| {
            let (prev_year, prev_month, prev_val) = w[0];
            let (year, month, val) = w[1];
            let _ = (prev_year, prev_month);
            let ret = if prev_val != 0.0 {
                (val - prev_val) / prev_val
            } else {
                0.0
            };
            MonthlyReturn {
                year,
                month,
                return_pct: round_to(ret * 100.0, 2),
            }
        })
        .collect()
}

/// Aggregates every metric from a completed run's snapshots and trades,
/// at the spec's default 4% risk-free rate / 252 trading days.
pub fn compute_all(snapshots: &[DailySnapshot], trades: &[TradeRecord]) -> BacktestMetrics {
    compute_all_with_rate(snapshots, trades, RISK_FREE_RATE, TRADING_DAYS_PER_YEAR)
}

/// Same as [`compute_all`], but with an operator-overridden risk-free
/// rate and/or trading-days-per-year annualization constant (spec §4.6
/// names both as fixed constants; an [`crate::config::EngineConfig`]
/// override only matters to an implementer running sensitivity studies,
/// not to the production defaults).
pub fn compute_all_with_rate(
    snapshots: &[DailySnapshot],
    trades: &[TradeRecord],
    risk_free_rate: f64,
    trading_days_per_year: f64,
) -> BacktestMetrics {
    if snapshots.is_empty() {
        return BacktestMetrics::default();
    }

    let portfolio_values: Vec<f64> = snapshots
        .iter()
        .map(|s| s.portfolio_value.to_string().parse().unwrap_or(0.0))
        .collect();
    let daily_rets = daily_returns(&portfolio_values);
    let daily_rf = risk_free_rate / trading_days_per_year;
    let excess: Vec<f64> = daily_rets.iter().map(|r| r - daily_rf).collect();

    let cagr = annual_return_with_days(&portfolio_values, trading_days_per_year);
    let mdd = max_drawdown(&portfolio_values);
    let calmar = if mdd == 0.0 { 0.0 } else { cagr / mdd };

    BacktestMetrics {
        total_return: round_to(total_return(&portfolio_values), 6),
        annual_return: round_to(cagr, 6),
        max_drawdown: round_to(mdd, 6),
        sharpe_ratio: round_to(sharpe_from_excess(&excess, trading_days_per_year), 4),
        sortino_ratio: round_to(sortino_from_excess(&excess, trading_days_per_year), 4),
        calmar_ratio: round_to(calmar, 4),
        win_rate: round_to(win_rate(trades), 4),
        profit_factor: round_to(profit_factor(trades), 4),
        avg_trade_duration: round_to(avg_trade_duration(trades), 1),
        avg_winning_trade: round_to(avg_winning_trade(trades), 4),
        avg_losing_trade: round_to(avg_losing_trade(trades), 4),
        total_trades: completed(trades).len(),
        trading_days: snapshots.len(),
    }
}

fn annual_return_with_days(portfolio_values: &[f64], trading_days_per_year: f64) -> f64 {
    if portfolio_values.len() < 2 {
        return 0.0;
    }
    let initial = portfolio_values[0];
    let final_ = *portfolio_values.last().unwrap();
    let n_days = (portfolio_values.len() - 1) as f64;
    if initial <= 0.0 || final_ <= 0.0 || n_days == 0.0 {
        return 0.0;
    }
    (final_ / initial).powf(trading_days_per_year / n_days) - 1.0
}

fn sharpe_from_excess(excess: &[f64], trading_days_per_year: f64) -> f64 {
    if excess.len() < 2 {
        return 0.0;
    }
    let std = sample_std(excess);
    if std == 0.0 {
        return 0.0;
    }
    (mean(excess) / std) * trading_days_per_year.sqrt()
}

fn sortino_from_excess(excess: &[f64], trading_days_per_year: f64) -> f64 {
    if excess.len() < 2 {
        return 0.0;
    }
    let downside: Vec<f64> = excess.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() || sample_std(&downside) == 0.0 {
        return 0.0;
    }
    let downside_std = (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
    (mean(excess) / downside_std) * trading_days_per_year.sqrt()
}

fn round_to(v: f64, places: i32) -> f64 {
    let mult = 10f64.powi(places);
    (v * mult).round() / mult
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn max_drawdown_flat() {
        let curve = vec![100.0, 100.0, 100.0];
        assert_eq!(max_drawdown(&curve), 0.0);
    }

    #[test]
    fn max_drawdown_50_pct() {
        let curve = vec![100.0, 120.0, 60.0, 80.0];
        let dd = max_drawdown(&curve);
        assert!((dd - 0.5).abs() < 1e-9, "dd = {dd}");
    }

    #[test]
    fn total_return_doubling() {
        let curve = vec![100.0, 150.0, 200.0];
        assert!((total_return(&curve) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_no_losses_is_infinite() {
        let trades = vec![TradeRecord {
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            symbol: "TQQQ",
            side: Side::Sell,
            shares: 10,
            price: 100.0,
            pnl: Some(50.0),
            duration_days: Some(5),
        }];
        assert_eq!(profit_factor(&trades), f64::INFINITY);
    }

    #[test]
    fn win_rate_counts_only_completed_sells() {
        let trades = vec![
            TradeRecord {
                date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                symbol: "TQQQ",
                side: Side::Buy,
                shares: 10,
                price: 100.0,
                pnl: None,
                duration_days: None,
            },
            TradeRecord {
                date: NaiveDate::from_ymd_opt(2020, 1, 9).unwrap(),
                symbol: "TQQQ",
                side: Side::Sell,
                shares: 10,
                price: 90.0,
                pnl: Some(-100.0),
                duration_days: Some(7),
            },
        ];
        assert_eq!(win_rate(&trades), 0.0);
    }
}
