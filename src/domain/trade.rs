//! Bar-by-bar exit modelling for a single trade.
//!
//! Each bar is checked for a stop-loss breach first and a take-profit breach
//! second, so a bar that touches both levels is always booked as a stop.

use serde::Serialize;
use std::fmt;

use super::ohlcv::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Long => f.write_str("long"),
            TradeSide::Short => f.write_str("short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeHorizonEnd,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TimeHorizonEnd => "time_horizon_end",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOutcome {
    pub side: TradeSide,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// Direction-adjusted return in percent.
    pub return_pct: f64,
    /// Worst adverse excursion as a non-positive fraction.
    pub max_drawdown: f64,
    /// Bars examined, including the bar that triggered the exit.
    pub trade_length: usize,
}

/// Stop/target levels for one side of the book.
#[derive(Debug, Clone, Copy)]
struct Levels {
    side: TradeSide,
    stop_loss: f64,
    take_profit: f64,
}

impl Levels {
    fn should_stop_loss(&self, bar: &PriceBar) -> bool {
        match self.side {
            TradeSide::Long => bar.low <= self.stop_loss,
            TradeSide::Short => bar.high >= self.stop_loss,
        }
    }

    fn should_take_profit(&self, bar: &PriceBar) -> bool {
        match self.side {
            TradeSide::Long => bar.high >= self.take_profit,
            TradeSide::Short => bar.low <= self.take_profit,
        }
    }
}

/// Walk `bars` in order until a stop or target triggers.
///
/// When no level triggers the trade closes at the entry price with reason
/// `TimeHorizonEnd`. The short-side drawdown tracks a running minimum of lows,
/// which is not the mirror image of the long-side peak convention.
pub fn simulate_trade(
    bars: &[PriceBar],
    side: TradeSide,
    entry_price: f64,
    stop_loss: f64,
    take_profit: f64,
) -> TradeOutcome {
    let levels = Levels {
        side,
        stop_loss,
        take_profit,
    };

    let mut peak = entry_price;
    let mut max_drawdown = 0.0_f64;
    let mut exit_price = entry_price;
    let mut exit_reason = ExitReason::TimeHorizonEnd;
    let mut trade_length = 0usize;

    for bar in bars {
        trade_length += 1;

        if levels.should_stop_loss(bar) {
            exit_price = stop_loss;
            exit_reason = ExitReason::StopLoss;
            break;
        }
        if levels.should_take_profit(bar) {
            exit_price = take_profit;
            exit_reason = ExitReason::TakeProfit;
            break;
        }

        let drawdown = match side {
            TradeSide::Long => {
                peak = peak.max(bar.high);
                if peak > 0.0 { (peak - bar.low) / peak } else { 0.0 }
            }
            TradeSide::Short => {
                peak = peak.min(bar.low);
                if peak > 0.0 { (bar.low - peak) / peak } else { 0.0 }
            }
        };
        max_drawdown = max_drawdown.min(-drawdown);
    }

    let return_pct = if entry_price > 0.0 {
        match side {
            TradeSide::Long => (exit_price - entry_price) / entry_price * 100.0,
            TradeSide::Short => (entry_price - exit_price) / entry_price * 100.0,
        }
    } else {
        0.0
    };

    TradeOutcome {
        side,
        entry_price,
        stop_loss,
        take_profit,
        exit_price,
        exit_reason,
        return_pct,
        max_drawdown,
        trade_length,
    }
}
