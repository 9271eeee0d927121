//! Batch backtesting of historical signals.
//!
//! BacktestConfig defines the overall data window fetched per ticker; each
//! signal is then evaluated over its own `[entry_date, entry_date + horizon]`
//! slice of that window.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::ohlcv::{slice_by_date, PriceBar};
use super::signal::{SignalRecord, TradeSetup};
use super::trade::{simulate_trade, TradeOutcome};
use crate::ports::bar_port::BarProvider;
use crate::ports::clock_port::Clock;

/// Earliest date requested from the bar provider by default.
pub const DEFAULT_START_DATE: (i32, u32, u32) = (1923, 1, 1);

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BacktestConfig {
    /// Full-history window ending today.
    pub fn ending_today(clock: &dyn Clock) -> Self {
        let (y, m, d) = DEFAULT_START_DATE;
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
            end_date: clock.today(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percentage of trades with a positive return.
    pub win_rate: f64,
    pub average_return_pct: f64,
    /// Worst per-trade drawdown, as a non-positive fraction.
    pub max_drawdown_pct: f64,
    pub trade_details: Vec<TradeOutcome>,
}

impl BacktestReport {
    fn from_outcomes(outcomes: Vec<TradeOutcome>) -> Self {
        let mut total_return = 0.0_f64;
        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut max_drawdown = 0.0_f64;

        for outcome in &outcomes {
            total_return += outcome.return_pct;
            if outcome.return_pct > 0.0 {
                wins += 1;
            } else {
                losses += 1;
            }
            max_drawdown = max_drawdown.min(outcome.max_drawdown);
        }

        let total_trades = wins + losses;
        let (win_rate, average_return_pct) = if total_trades > 0 {
            (
                wins as f64 / total_trades as f64 * 100.0,
                total_return / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        BacktestReport {
            total_trades,
            wins,
            losses,
            win_rate,
            average_return_pct,
            max_drawdown_pct: max_drawdown,
            trade_details: outcomes,
        }
    }
}

/// Drives the trade simulator across a batch of signals.
pub struct Backtester<'a> {
    provider: &'a dyn BarProvider,
    config: BacktestConfig,
}

impl<'a> Backtester<'a> {
    pub fn new(provider: &'a dyn BarProvider, config: BacktestConfig) -> Self {
        Backtester { provider, config }
    }

    /// Evaluate every record; unusable records are logged and skipped.
    pub fn run(&self, records: &[SignalRecord]) -> BacktestReport {
        // None records a ticker whose fetch failed or came back empty.
        let mut history: HashMap<String, Option<Vec<PriceBar>>> = HashMap::new();
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            let setup = match record.resolve() {
                Ok(s) => s,
                Err(e) => {
                    warn!("skipping signal ({e})");
                    continue;
                }
            };

            let cached = history.entry(setup.asset.clone()).or_insert_with(|| {
                self.load_history(&setup.asset)
                    .map_err(|e| warn!("no history for {} ({e})", setup.asset))
                    .ok()
            });
            let Some(bars) = cached.as_deref() else {
                warn!("skipping {} signal on {}", setup.asset, setup.entry_date);
                continue;
            };

            match self.evaluate(&setup, bars) {
                Some(outcome) => outcomes.push(outcome),
                None => warn!(
                    "no price data in backtest window for {} from {} to {}",
                    setup.asset,
                    setup.entry_date,
                    setup.window_end()
                ),
            }
        }

        let report = BacktestReport::from_outcomes(outcomes);
        info!(
            "backtest complete: {} of {} signals traded, win rate {:.1}%",
            report.total_trades,
            records.len(),
            report.win_rate
        );
        report
    }

    fn load_history(&self, ticker: &str) -> Result<Vec<PriceBar>, EngineError> {
        let bars = self
            .provider
            .fetch_bars(ticker, self.config.start_date, self.config.end_date)?;
        if bars.is_empty() {
            return Err(EngineError::MissingData {
                ticker: ticker.to_string(),
            });
        }
        Ok(bars)
    }

    fn evaluate(&self, setup: &TradeSetup, bars: &[PriceBar]) -> Option<TradeOutcome> {
        let window = slice_by_date(bars, setup.entry_date, setup.window_end());
        if window.is_empty() {
            return None;
        }

        let outcome = simulate_trade(
            &window,
            setup.side,
            setup.entry_price,
            setup.stop_loss,
            setup.take_profit,
        );
        debug!(
            "{} {} exited via {} at {:.2} ({:+.2}%) after {} bars",
            setup.asset,
            setup.side,
            outcome.exit_reason,
            outcome.exit_price,
            outcome.return_pct,
            outcome.trade_length
        );
        Some(outcome)
    }
}
