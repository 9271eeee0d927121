//! Trading signals and the resolved records the engine works from.
//!
//! Upstream producers hand over loosely-populated records. Defaults are applied
//! once here, so the simulators downstream only ever see complete values.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::EngineError;
use super::trade::TradeSide;

/// Fallback stop distance when a signal carries no stop-loss.
pub const DEFAULT_STOP_FRACTION: f64 = 0.05;
/// Fallback target distance when a signal carries no take-profit.
pub const DEFAULT_TARGET_FRACTION: f64 = 0.10;
/// Fallback ATR as a fraction of entry price.
pub const DEFAULT_ATR_FRACTION: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Direction::Long),
            "short" | "sell" => Ok(Direction::Short),
            "neutral" => Ok(Direction::Neutral),
            other => Err(EngineError::malformed(format!("unknown direction '{other}'"))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Long => "long",
            Direction::Short => "short",
            Direction::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    /// Fraction of the portfolio committed by fixed-fractional sizing.
    pub fn fixed_fraction(self) -> f64 {
        match self {
            RiskLevel::Low => 0.03,
            RiskLevel::Medium => 0.02,
            RiskLevel::High => 0.01,
        }
    }
}

impl FromStr for RiskLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(EngineError::malformed(format!("unknown risk level '{other}'"))),
        }
    }
}

/// Technical indicator bundle attached by the analysis collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub atr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub asset: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    pub time_horizon_days: u32,
    pub sector: Option<String>,
    pub technical: TechnicalIndicators,
    pub created_at: NaiveDateTime,
}

impl Signal {
    /// Confidence clamped into [0, 100]; non-finite values fall back to 50.
    pub fn confidence(&self) -> f64 {
        if self.confidence_score.is_finite() {
            self.confidence_score.clamp(0.0, 100.0)
        } else {
            50.0
        }
    }

    pub fn resolved_stop_loss(&self) -> f64 {
        self.stop_loss
            .unwrap_or(self.entry_price * (1.0 - DEFAULT_STOP_FRACTION))
    }

    pub fn resolved_take_profit(&self) -> f64 {
        self.take_profit
            .unwrap_or(self.entry_price * (1.0 + DEFAULT_TARGET_FRACTION))
    }

    /// ATR from the indicator bundle; absent or non-positive means "unknown".
    pub fn atr(&self) -> Option<f64> {
        self.technical.atr.filter(|a| a.is_finite() && *a > 0.0)
    }

    pub fn resolved_atr(&self) -> f64 {
        self.atr()
            .unwrap_or(self.entry_price * DEFAULT_ATR_FRACTION)
    }

    pub fn sector(&self) -> Option<&str> {
        self.sector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("unknown"))
    }
}

/// Raw backtest input as delivered by the signal store. Every field may be
/// missing; [`SignalRecord::resolve`] decides whether the record is usable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SignalRecord {
    pub asset: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub direction: Option<String>,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub time_horizon: Option<u32>,
}

impl SignalRecord {
    pub fn resolve(&self) -> Result<TradeSetup, EngineError> {
        let asset = self
            .asset
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| EngineError::malformed("missing asset"))?
            .to_uppercase();

        let entry_date = self
            .entry_date
            .ok_or_else(|| EngineError::malformed(format!("{asset}: missing entry_date")))?;

        let direction: Direction = self
            .direction
            .as_deref()
            .ok_or_else(|| EngineError::malformed(format!("{asset}: missing direction")))?
            .parse()?;
        let side = match direction {
            Direction::Long => TradeSide::Long,
            Direction::Short => TradeSide::Short,
            Direction::Neutral => {
                return Err(EngineError::malformed(format!(
                    "{asset}: neutral signals cannot be traded"
                )));
            }
        };

        let entry_price = self
            .entry_price
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| {
                EngineError::malformed(format!("{asset}: entry_price must be positive"))
            })?;

        let stop_loss = match self.stop_loss.filter(|p| p.is_finite() && *p > 0.0) {
            Some(p) => p,
            None => match side {
                TradeSide::Long => entry_price * (1.0 - DEFAULT_STOP_FRACTION),
                TradeSide::Short => entry_price * (1.0 + DEFAULT_STOP_FRACTION),
            },
        };
        let take_profit = match self.take_profit.filter(|p| p.is_finite() && *p > 0.0) {
            Some(p) => p,
            None => match side {
                TradeSide::Long => entry_price * (1.0 + DEFAULT_TARGET_FRACTION),
                TradeSide::Short => entry_price * (1.0 - DEFAULT_TARGET_FRACTION),
            },
        };

        let time_horizon_days = self.time_horizon.unwrap_or(1).max(1);
        if entry_date
            .checked_add_days(Days::new(u64::from(time_horizon_days)))
            .is_none()
        {
            return Err(EngineError::malformed(format!(
                "{asset}: time_horizon of {time_horizon_days} days runs past the calendar"
            )));
        }

        Ok(TradeSetup {
            asset,
            entry_date,
            side,
            entry_price,
            stop_loss,
            take_profit,
            time_horizon_days,
        })
    }
}

/// A fully-resolved trade ready for simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeSetup {
    pub asset: String,
    pub entry_date: NaiveDate,
    pub side: TradeSide,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub time_horizon_days: u32,
}

impl TradeSetup {
    /// Last date of the holding window, saturating at the end of the calendar.
    pub fn window_end(&self) -> NaiveDate {
        self.entry_date
            .checked_add_days(Days::new(u64::from(self.time_horizon_days)))
            .unwrap_or(NaiveDate::MAX)
    }
}
