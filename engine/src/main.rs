//! main.rs — Backtest Demo Entry Point
//!
//! Runs a demonstration backtest of the White Light strategy engine:
//!   1. Load tunables from `.env` (or the spec's production defaults).
//!   2. Build a synthetic three-instrument bar history (NDX/TQQQ/SQQQ)
//!      standing in for the named-but-unimplemented market-data
//!      collaborator — this binary does no real I/O.
//!   3. Run the day-by-day backtest.
//!   4. Print the persisted-report JSON and a one-line metrics summary.

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use tracing::info;
use tracing_subscriber::EnvFilter;

use whitelight_engine::backtest::{BacktestConfig, BacktestRunner};
use whitelight_engine::config::EngineConfig;
use whitelight_engine::models::{Bar, BarHistory};
use whitelight_engine::report::BacktestReport;

/// Synthesizes a deterministic demo bar series: a slow upward drift with
/// a sine-wave wiggle and a simulated crash-and-recovery band, so every
/// sub-strategy sees both trending and mean-reverting regimes. This is
/// demo data only — `fetch_bars` (spec §6) is the real collaborator.
fn synthetic_index(start: NaiveDate, days: i64, base: f64) -> BarHistory {
    let bars = (0..days)
        .map(|i| {
            let t = i as f64;
            let drift = base * (1.0 + 0.00025 * t);
            let wiggle = (t / 17.0).sin() * base * 0.01;
            let crash = if (700..760).contains(&i) {
                -0.25 * base * ((i - 700) as f64 / 60.0)
            } else {
                0.0
            };
            let close = drift + wiggle + crash;
            Bar {
                date: start + Duration::days(i),
                open: close * 0.999,
                high: close * 1.004,
                low: close * 0.996,
                close,
                volume: 50_000_000,
            }
        })
        .collect();
    BarHistory::new(bars)
}

/// Derives a 3x leveraged-long series from the index's daily returns,
/// compounded from `base`. Standing in for the real TQQQ series.
fn synthetic_leveraged_long(index: &BarHistory, base: f64) -> BarHistory {
    derive_leveraged(index, base, 3.0)
}

/// Derives a -3x inverse series from the index's daily returns,
/// compounded from `base`. Standing in for the real SQQQ series.
fn synthetic_inverse(index: &BarHistory, base: f64) -> BarHistory {
    derive_leveraged(index, base, -3.0)
}

fn derive_leveraged(index: &BarHistory, base: f64, leverage: f64) -> BarHistory {
    let bars = index.bars();
    let mut price = base;
    let mut out = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev_close = bars[i - 1].close;
            let daily_ret = (bar.close / prev_close) - 1.0;
            price *= 1.0 + leverage * daily_ret;
            price = price.max(0.01);
        }
        out.push(Bar {
            date: bar.date,
            open: price * 0.999,
            high: price * 1.01,
            low: price * 0.99,
            close: price,
            volume: bar.volume,
        });
    }
    BarHistory::new(out)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("White Light strategy engine — backtest demo");

    let engine_config = EngineConfig::from_env()?;
    info!(
        target_vol = engine_config.target_vol,
        sqqq_sprint_pct = engine_config.sqqq_sprint_pct,
        risk_free_rate = engine_config.risk_free_rate,
        "loaded engine config"
    );

    let start = NaiveDate::from_ymd_opt(2018, 1, 2).expect("valid date");
    let days = 1_200;
    let ndx = synthetic_index(start, days, 10_000.0);
    let tqqq = synthetic_leveraged_long(&ndx, 50.0);
    let sqqq = synthetic_inverse(&ndx, 30.0);
    let end = ndx.last().expect("non-empty demo history").date;

    let bt_config = BacktestConfig::from_engine_config(&engine_config, start, end);
    let mut runner = BacktestRunner::with_engine_config(&engine_config, bt_config);
    let result = runner.run(&ndx, &tqqq, &sqqq)?;

    info!(
        trading_days = result.daily_snapshots.len(),
        trades = result.trades.len(),
        total_return = result.metrics.total_return,
        max_drawdown = result.metrics.max_drawdown,
        sharpe_ratio = result.metrics.sharpe_ratio,
        "backtest complete"
    );

    let report = BacktestReport::from_result(&result);
    println!("{}", report.to_json_pretty()?);

    Ok(())
}
