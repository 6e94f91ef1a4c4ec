//! White Light strategy engine.
//!
//! Indicator-driven sub-strategies (C1/C2), a stateful volatility-targeted
//! signal combiner (C3), the strategy engine that ties them together (C4),
//! a day-by-day backtest runner (C5), and the performance metrics derived
//! from a completed run (C6). Market data acquisition, brokerage and
//! notification providers, credential retrieval, and CLI wiring are all
//! external collaborators with no implementation in this crate.

pub mod backtest;
pub mod combiner;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod metrics;
pub mod models;
pub mod report;
pub mod strategy;
pub mod validation;

pub use models::*;
