//! Core domain types and risk models. Pure and synchronous; all I/O goes
//! through the traits in [`crate::ports`].

pub mod signal;
pub mod ohlcv;
pub mod trade;
pub mod backtest;
pub mod position_sizing;
pub mod monte_carlo;
pub mod correlation;
pub mod drawdown;
pub mod stops;
pub mod trade_analysis;
pub mod stats;
pub mod config_validation;
pub mod error;
