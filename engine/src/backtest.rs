//! C5 — Backtest runner: replays NDX, TQQQ, and SQQQ daily bars through the
//! strategy engine day by day, simulating integer-share rebalancing at
//! closing prices and round-trip trade accounting.
//!
//! No slippage is modeled — TQQQ and SQQQ are liquid enough that a
//! same-close fill is a reasonable approximation, matching the live
//! system's execution assumption.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::{info, warn};

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::config::EngineConfig;
use crate::engine::StrategyEngine;
use crate::metrics::{self, BacktestMetrics, MonthlyReturn};
use crate::models::{Bar, BarHistory, DailySnapshot, OpenPosition, Side, TargetAllocation, TradeRecord};
use crate::validation::{validate_history, ValidationError};

/// Minimum lookback, in trading days, before the engine is evaluated —
/// covers the longest indicator window (S1's 250-day SMA) with a buffer.
const DEFAULT_WARMUP_DAYS: usize = 260;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: Decimal,
    pub warmup_days: usize,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            initial_capital: Decimal::from(100_000),
            warmup_days: DEFAULT_WARMUP_DAYS,
        }
    }

    /// Builds a config over `[start_date, end_date]` using the
    /// `initial_capital`/`warmup_days` carried by an [`EngineConfig`],
    /// rather than this type's own hardcoded defaults.
    pub fn from_engine_config(
        config: &EngineConfig,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            start_date,
            end_date,
            initial_capital: Decimal::from_str(&format!("{:.4}", config.initial_capital))
                .unwrap_or_else(|_| Decimal::from(100_000)),
            warmup_days: config.warmup_days,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub daily_snapshots: Vec<DailySnapshot>,
    pub trades: Vec<TradeRecord>,
    pub metrics: BacktestMetrics,
    pub monthly_returns: Vec<MonthlyReturn>,
}

/// Sequentially drives the engine across every trading day common to all
/// three instruments. Owns its own [`StrategyEngine`] (and, through it,
/// the combiner's state) for the run's lifetime — never shared across
/// runs.
pub struct BacktestRunner {
    engine: StrategyEngine,
    config: BacktestConfig,
    risk_free_rate: f64,
    trading_days_per_year: f64,
}

impl BacktestRunner {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            engine: StrategyEngine::with_default_strategies(),
            config,
            risk_free_rate: metrics::RISK_FREE_RATE,
            trading_days_per_year: metrics::TRADING_DAYS_PER_YEAR,
        }
    }

    pub fn with_engine(engine: StrategyEngine, config: BacktestConfig) -> Self {
        Self {
            engine,
            config,
            risk_free_rate: metrics::RISK_FREE_RATE,
            trading_days_per_year: metrics::TRADING_DAYS_PER_YEAR,
        }
    }

    /// Builds a runner whose engine (sub-strategy weights, combiner
    /// tunables) and metrics annualization constants are all driven by
    /// the same [`EngineConfig`] used to derive `config`.
    pub fn with_engine_config(engine_config: &EngineConfig, config: BacktestConfig) -> Self {
        Self {
            engine: StrategyEngine::with_config(engine_config),
            config,
            risk_free_rate: engine_config.risk_free_rate,
            trading_days_per_year: engine_config.trading_days_per_year,
        }
    }

    pub fn run(
        &mut self,
        ndx: &BarHistory,
        tqqq: &BarHistory,
        sqqq: &BarHistory,
    ) -> Result<BacktestResult, ValidationError> {
        validate_history(ndx)?;
        validate_history(tqqq)?;
        validate_history(sqqq)?;

        let tqqq_by_date: HashMap<NaiveDate, Bar> =
            tqqq.bars().iter().map(|b| (b.date, *b)).collect();
        let sqqq_by_date: HashMap<NaiveDate, Bar> =
            sqqq.bars().iter().map(|b| (b.date, *b)).collect();

        let mut trading_days: Vec<NaiveDate> = ndx
            .bars()
            .iter()
            .map(|b| b.date)
            .filter(|d| {
                *d >= self.config.start_date
                    && *d <= self.config.end_date
                    && tqqq_by_date.contains_key(d)
                    && sqqq_by_date.contains_key(d)
            })
            .collect();
        trading_days.sort_unstable();

        if trading_days.is_empty() {
            warn!("no trading days found in the requested range");
            return Ok(BacktestResult {
                config: self.config.clone(),
                daily_snapshots: vec![],
                trades: vec![],
                metrics: BacktestMetrics::default(),
                monthly_returns: vec![],
            });
        }

        info!(
            days = trading_days.len(),
            first = %trading_days[0],
            last = %trading_days[trading_days.len() - 1],
            "backtesting trading days"
        );

        let mut cash = self.config.initial_capital;
        let mut tqqq_shares: i64 = 0;
        let mut sqqq_shares: i64 = 0;

        let mut snapshots = Vec::with_capacity(trading_days.len());
        let mut all_trades = Vec::new();
        let mut open_positions: HashMap<&'static str, OpenPosition> = HashMap::new();

        for day in trading_days {
            let tqqq_price = tqqq_by_date[&day].close;
            let sqqq_price = sqqq_by_date[&day].close;

            let ndx_slice = ndx.slice_through(day);
            if ndx_slice.len() < self.config.warmup_days {
                // Spec §4.5 step 2: not enough warmup yet — hold whatever
                // positions exist (none have been opened), record a
                // zero-target snapshot, and move on without trading.
                let portfolio_val =
                    portfolio_value(cash, tqqq_shares, tqqq_price, sqqq_shares, sqqq_price);
                snapshots.push(DailySnapshot {
                    date: day,
                    target: TargetAllocation::cash_only(vec![], 0.0),
                    tqqq_shares,
                    sqqq_shares,
                    cash,
                    portfolio_value: portfolio_val,
                    tqqq_price,
                    sqqq_price,
                    composite_score: 0.0,
                });
                continue;
            }

            // Spec §4.5 step 3: an engine panic mid-day is recovered
            // locally — hold existing positions and record a zero-target
            // snapshot rather than aborting the run.
            let engine = &mut self.engine;
            let evaluated = catch_unwind(AssertUnwindSafe(|| engine.evaluate(&ndx_slice)));
            let target = match evaluated {
                Ok(target) => target,
                Err(_) => {
                    warn!(%day, "strategy engine panicked; holding positions for this day");
                    let portfolio_val =
                        portfolio_value(cash, tqqq_shares, tqqq_price, sqqq_shares, sqqq_price);
                    snapshots.push(DailySnapshot {
                        date: day,
                        target: TargetAllocation::cash_only(vec![], 0.0),
                        tqqq_shares,
                        sqqq_shares,
                        cash,
                        portfolio_value: portfolio_val,
                        tqqq_price,
                        sqqq_price,
                        composite_score: 0.0,
                    });
                    continue;
                }
            };

            let portfolio_val =
                portfolio_value(cash, tqqq_shares, tqqq_price, sqqq_shares, sqqq_price);

            let target_tqqq_shares = target_share_count(portfolio_val, target.tqqq_pct, tqqq_price);
            let target_sqqq_shares = target_share_count(portfolio_val, target.sqqq_pct, sqqq_price);

            let day_trades = rebalance(
                day,
                &mut cash,
                &mut tqqq_shares,
                &mut sqqq_shares,
                target_tqqq_shares,
                target_sqqq_shares,
                tqqq_price,
                sqqq_price,
                &mut open_positions,
            );
            all_trades.extend(day_trades);

            let portfolio_val =
                portfolio_value(cash, tqqq_shares, tqqq_price, sqqq_shares, sqqq_price);

            let composite_score = target.composite_score;
            snapshots.push(DailySnapshot {
                date: day,
                target,
                tqqq_shares,
                sqqq_shares,
                cash,
                portfolio_value: portfolio_val,
                tqqq_price,
                sqqq_price,
                composite_score,
            });
        }

        let result_metrics = metrics::compute_all_with_rate(
            &snapshots,
            &all_trades,
            self.risk_free_rate,
            self.trading_days_per_year,
        );
        let monthly_rets = metrics::monthly_returns(&snapshots);

        info!(
            snapshots = snapshots.len(),
            trades = all_trades.len(),
            "backtest complete"
        );

        Ok(BacktestResult {
            config: self.config.clone(),
            daily_snapshots: snapshots,
            trades: all_trades,
            metrics: result_metrics,
            monthly_returns: monthly_rets,
        })
    }
}

fn portfolio_value(
    cash: Decimal,
    tqqq_shares: i64,
    tqqq_price: f64,
    sqqq_shares: i64,
    sqqq_price: f64,
) -> Decimal {
    cash + decimal_value(tqqq_shares, tqqq_price) + decimal_value(sqqq_shares, sqqq_price)
}

fn decimal_value(shares: i64, price: f64) -> Decimal {
    Decimal::from_str(&format!("{:.6}", shares as f64 * price)).unwrap_or(Decimal::ZERO)
}

fn target_share_count(portfolio_value: Decimal, pct: Decimal, price: f64) -> i64 {
    if price <= 0.0 {
        return 0;
    }
    let target_value = portfolio_value * pct;
    let price_decimal = Decimal::from_str(&format!("{:.6}", price)).unwrap_or(Decimal::ONE);
    (target_value / price_decimal).trunc().try_into().unwrap_or(0)
}

/// Simulates rebalancing to the target share counts at closing prices.
/// Per spec §4.5 step 6, every sell leg across both instruments executes
/// before any buy leg, so a same-day liquidation frees cash before it is
/// spent on a newly-opened position.
#[allow(clippy::too_many_arguments)]
fn rebalance(
    day: NaiveDate,
    cash: &mut Decimal,
    tqqq_shares: &mut i64,
    sqqq_shares: &mut i64,
    target_tqqq_shares: i64,
    target_sqqq_shares: i64,
    tqqq_price: f64,
    sqqq_price: f64,
    open_positions: &mut HashMap<&'static str, OpenPosition>,
) -> Vec<TradeRecord> {
    let mut trades = Vec::new();

    let legs: [(&'static str, &mut i64, i64, f64); 2] = [
        ("TQQQ", tqqq_shares, target_tqqq_shares, tqqq_price),
        ("SQQQ", sqqq_shares, target_sqqq_shares, sqqq_price),
    ];

    let mut sells = Vec::new();
    let mut buys = Vec::new();
    for (symbol, shares, target, price) in legs {
        if target - *shares < 0 {
            sells.push((symbol, shares, target, price));
        } else {
            buys.push((symbol, shares, target, price));
        }
    }

    for (symbol, shares, target, price) in sells.into_iter().chain(buys) {
        rebalance_one(day, symbol, cash, shares, target, price, open_positions, &mut trades);
    }

    trades
}

#[allow(clippy::too_many_arguments)]
fn rebalance_one(
    day: NaiveDate,
    symbol: &'static str,
    cash: &mut Decimal,
    shares: &mut i64,
    target_shares: i64,
    price: f64,
    open_positions: &mut HashMap<&'static str, OpenPosition>,
    trades: &mut Vec<TradeRecord>,
) {
    let delta = target_shares - *shares;
    if delta == 0 {
        return;
    }

    if delta > 0 {
        *cash -= decimal_value(delta, price);
        *shares += delta;
        trades.push(TradeRecord {
            date: day,
            symbol,
            side: Side::Buy,
            shares: delta,
            price,
            pnl: None,
            duration_days: None,
        });

        open_positions
            .entry(symbol)
            .and_modify(|pos| {
                let total = pos.shares + delta;
                pos.entry_price =
                    (pos.entry_price * pos.shares as f64 + price * delta as f64) / total as f64;
                pos.shares = total;
            })
            .or_insert(OpenPosition {
                entry_date: day,
                entry_price: price,
                shares: delta,
            });
    } else {
        let sell_qty = -delta;
        *cash += decimal_value(sell_qty, price);
        *shares -= sell_qty;

        let mut record = TradeRecord {
            date: day,
            symbol,
            side: Side::Sell,
            shares: sell_qty,
            price,
            pnl: None,
            duration_days: None,
        };

        if let Some(pos) = open_positions.get(symbol).copied() {
            record.pnl = Some((price - pos.entry_price) * sell_qty as f64);
            record.duration_days = Some((day - pos.entry_date).num_days());
            if sell_qty >= pos.shares {
                open_positions.remove(symbol);
            } else {
                open_positions.insert(
                    symbol,
                    OpenPosition {
                        entry_date: pos.entry_date,
                        entry_price: pos.entry_price,
                        shares: pos.shares - sell_qty,
                    },
                );
            }
        }

        trades.push(record);
    }
}

/// Runs several independent backtests in parallel. Each item gets its own
/// [`BacktestRunner`] — no state is shared across runs — so fan-out is
/// safe with no synchronization. Results preserve input order.
pub fn run_many(
    runs: Vec<(BacktestConfig, BarHistory, BarHistory, BarHistory)>,
) -> Vec<Result<BacktestResult, ValidationError>> {
    runs.into_par_iter()
        .map(|(config, ndx, tqqq, sqqq)| {
            let mut runner = BacktestRunner::new(config);
            runner.run(&ndx, &tqqq, &sqqq)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;

    fn flat_bars(start: NaiveDate, days: i64, price: f64) -> BarHistory {
        BarHistory::new(
            (0..days)
                .map(|i| Bar {
                    date: start + chrono::Duration::days(i),
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
    fn constant_price_history_holds_value_flat() {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let ndx = flat_bars(start, 300, 10_000.0);
        let tqqq = flat_bars(start, 300, 50.0);
        let sqqq = flat_bars(start, 300, 20.0);

        let end = start + chrono::Duration::days(299);
        let config = BacktestConfig::new(start, end);
        let mut runner = BacktestRunner::new(config);
        let result = runner.run(&ndx, &tqqq, &sqqq).expect("valid history");

        assert!(!result.daily_snapshots.is_empty());
        let first_val = result.daily_snapshots.first().unwrap().portfolio_value;
        let last_val = result.daily_snapshots.last().unwrap().portfolio_value;
        assert!((first_val - last_val).abs() < Decimal::new(1, 0));
    }

    #[test]
    fn empty_range_yields_empty_result() {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let ndx = flat_bars(start, 300, 10_000.0);
        let tqqq = flat_bars(start, 300, 50.0);
        let sqqq = flat_bars(start, 300, 20.0);

        let config = BacktestConfig::new(
            NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2030, 2, 1).unwrap(),
        );
        let mut runner = BacktestRunner::new(config);
        let result = runner.run(&ndx, &tqqq, &sqqq).expect("valid history");
        assert!(result.daily_snapshots.is_empty());
        assert!(result.trades.is_empty());
    }

    #[test]
    fn rejects_invalid_history() {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let mut bars = flat_bars(start, 10, 100.0).bars().to_vec();
        bars[3].close = -1.0;
        let bad_ndx = BarHistory::new(bars);
        let tqqq = flat_bars(start, 10, 50.0);
        let sqqq = flat_bars(start, 10, 20.0);

        let config = BacktestConfig::new(start, start + chrono::Duration::days(9));
        let mut runner = BacktestRunner::new(config);
        assert!(runner.run(&bad_ndx, &tqqq, &sqqq).is_err());
    }
}
