//! Position sizing from four blended heuristics.
//!
//! Kelly, fixed-fractional and volatility-adjusted share counts are averaged,
//! throttled by portfolio heat, then capped by a 10% notional limit and the
//! per-trade risk budget.

use serde::Serialize;
use tracing::error;

use super::error::EngineError;
use super::signal::{RiskLevel, Signal, DEFAULT_STOP_FRACTION};
use super::stats::{mean, round_to};

/// Assumed reward-to-risk payoff for the Kelly estimate.
const KELLY_PAYOFF_RATIO: f64 = 2.0;
/// Fraction of the full Kelly bet actually taken.
const KELLY_SAFETY_FACTOR: f64 = 0.25;
/// Baseline notional for volatility-adjusted sizing.
const VOLATILITY_BASE_FRACTION: f64 = 0.02;
/// Ceiling on aggregate open risk as a fraction of the portfolio.
const MAX_PORTFOLIO_HEAT: f64 = 0.06;
/// Largest single position as a fraction of the portfolio.
const MAX_POSITION_FRACTION: f64 = 0.10;

/// Static engine configuration shared by sizing and trade analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskConfig {
    pub portfolio_value: f64,
    /// Maximum fraction of the portfolio put at risk by one trade.
    pub max_portfolio_risk: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            portfolio_value: 100_000.0,
            max_portfolio_risk: 0.02,
        }
    }
}

/// Current account state, when the caller has it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioContext {
    /// Currency amount currently at risk across open positions.
    pub total_risk_exposure: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizingRequest {
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub atr: Option<f64>,
}

impl SizingRequest {
    pub fn from_signal(signal: &Signal) -> Self {
        SizingRequest {
            confidence_score: signal.confidence(),
            risk_level: signal.risk_level,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            atr: signal.atr(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSizingResult {
    pub shares: u64,
    pub position_value: f64,
    pub portfolio_percentage: f64,
    pub risk_per_share: f64,
    pub kelly_size: f64,
    pub fixed_fractional_size: f64,
    pub volatility_adjusted_size: f64,
    pub portfolio_heat_adjustment: f64,
    pub max_risk_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PositionSizingResult {
    /// One share with a 5% stop, used whenever sizing cannot be computed.
    pub fn conservative(entry_price: f64, reason: String) -> Self {
        let fallback_risk = entry_price * DEFAULT_STOP_FRACTION;
        PositionSizingResult {
            shares: 1,
            position_value: entry_price,
            portfolio_percentage: 1.0,
            risk_per_share: fallback_risk,
            kelly_size: 0.0,
            fixed_fractional_size: 0.0,
            volatility_adjusted_size: 0.0,
            portfolio_heat_adjustment: 1.0,
            max_risk_amount: fallback_risk,
            error: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        PositionSizer { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Size a position. Never fails: degenerate input yields the conservative
    /// one-share result annotated with the error.
    pub fn size(
        &self,
        request: &SizingRequest,
        portfolio: Option<&PortfolioContext>,
    ) -> PositionSizingResult {
        self.try_size(request, portfolio).unwrap_or_else(|e| {
            error!("error calculating position size: {e}");
            PositionSizingResult::conservative(request.entry_price, e.to_string())
        })
    }

    pub fn try_size(
        &self,
        request: &SizingRequest,
        portfolio: Option<&PortfolioContext>,
    ) -> Result<PositionSizingResult, EngineError> {
        let portfolio_value = self.config.portfolio_value;
        let entry_price = request.entry_price;

        if !(entry_price.is_finite() && entry_price > 0.0) {
            return Err(EngineError::computation(
                "position sizing",
                format!("entry price must be positive, got {entry_price}"),
            ));
        }
        if !(portfolio_value.is_finite() && portfolio_value > 0.0) {
            return Err(EngineError::computation(
                "position sizing",
                format!("portfolio value must be positive, got {portfolio_value}"),
            ));
        }

        let stop_loss = request
            .stop_loss
            .unwrap_or(entry_price * (1.0 - DEFAULT_STOP_FRACTION));
        let risk_per_share = (entry_price - stop_loss).abs();
        if !(risk_per_share.is_finite() && risk_per_share > 0.0) {
            return Err(EngineError::computation(
                "position sizing",
                "risk per share is zero",
            ));
        }

        let kelly_size = self.kelly_size(request.confidence_score, entry_price);
        let fixed_fractional_size = self.fixed_fractional_size(request.risk_level);
        let volatility_adjusted_size = self.volatility_adjusted_size(entry_price, request.atr);
        let heat = self.heat_adjustment(portfolio);

        let base_size = mean(&[kelly_size, fixed_fractional_size, volatility_adjusted_size]);
        let adjusted_size = base_size * heat;

        let max_shares = portfolio_value * MAX_POSITION_FRACTION / entry_price;
        let risk_based_shares = portfolio_value * self.config.max_portfolio_risk / risk_per_share;
        let final_shares = adjusted_size.min(max_shares).min(risk_based_shares);

        let position_value = final_shares * entry_price;
        let portfolio_percentage = position_value / portfolio_value * 100.0;

        Ok(PositionSizingResult {
            shares: (final_shares.floor() as u64).max(1),
            position_value: round_to(position_value, 2),
            portfolio_percentage: round_to(portfolio_percentage, 2),
            risk_per_share: round_to(risk_per_share, 2),
            kelly_size: round_to(kelly_size, 2),
            fixed_fractional_size: round_to(fixed_fractional_size, 2),
            volatility_adjusted_size: round_to(volatility_adjusted_size, 2),
            portfolio_heat_adjustment: round_to(heat, 3),
            max_risk_amount: round_to(final_shares * risk_per_share, 2),
            error: None,
        })
    }

    /// Quarter-Kelly share count assuming a 2:1 payoff. Never negative.
    pub fn kelly_size(&self, confidence_score: f64, entry_price: f64) -> f64 {
        let p = (confidence_score / 100.0).clamp(0.0, 1.0);
        let q = 1.0 - p;
        let b = KELLY_PAYOFF_RATIO;
        let fraction = ((b * p - q) / b).max(0.0);
        fraction * KELLY_SAFETY_FACTOR * self.config.portfolio_value / entry_price
    }

    /// Portfolio value times the risk-level fraction, read as a share count.
    pub fn fixed_fractional_size(&self, risk_level: RiskLevel) -> f64 {
        self.config.portfolio_value * risk_level.fixed_fraction() / 100.0
    }

    pub fn volatility_adjusted_size(&self, entry_price: f64, atr: Option<f64>) -> f64 {
        let base = self.config.portfolio_value * VOLATILITY_BASE_FRACTION / entry_price;
        let Some(atr) = atr.filter(|a| a.is_finite() && *a > 0.0) else {
            return base;
        };
        let volatility_pct = atr / entry_price * 100.0;
        let adjustment = if volatility_pct > 5.0 {
            0.5
        } else if volatility_pct > 3.0 {
            0.75
        } else {
            1.0
        };
        base * adjustment
    }

    /// Throttle new positions as open risk approaches the heat ceiling.
    pub fn heat_adjustment(&self, portfolio: Option<&PortfolioContext>) -> f64 {
        let Some(ctx) = portfolio else {
            return 1.0;
        };
        let max_heat = self.config.portfolio_value * MAX_PORTFOLIO_HEAT;
        if ctx.total_risk_exposure >= max_heat {
            0.1
        } else if ctx.total_risk_exposure >= max_heat * 0.8 {
            0.5
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn request(confidence: f64, entry: f64, stop: f64) -> SizingRequest {
        SizingRequest {
            confidence_score: confidence,
            risk_level: RiskLevel::Medium,
            entry_price: entry,
            stop_loss: Some(stop),
            atr: None,
        }
    }

    #[test]
    fn kelly_with_two_to_one_payoff() {
        let sizer = PositionSizer::default();
        // p = 0.6: (2*0.6 - 0.4) / 2 = 0.4; 0.4 * 0.25 * 100k / 100 = 100
        assert_relative_eq!(sizer.kelly_size(60.0, 100.0), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn kelly_is_clamped_at_zero() {
        let sizer = PositionSizer::default();
        assert_eq!(sizer.kelly_size(20.0, 100.0), 0.0);
        assert_eq!(sizer.kelly_size(0.0, 100.0), 0.0);
    }

    #[test]
    fn fixed_fractional_by_risk_level() {
        let sizer = PositionSizer::default();
        assert_relative_eq!(sizer.fixed_fractional_size(RiskLevel::Low), 30.0);
        assert_relative_eq!(sizer.fixed_fractional_size(RiskLevel::Medium), 20.0);
        assert_relative_eq!(sizer.fixed_fractional_size(RiskLevel::High), 10.0);
    }

    #[test]
    fn volatility_adjustment_bands() {
        let sizer = PositionSizer::default();
        assert_relative_eq!(sizer.volatility_adjusted_size(100.0, None), 20.0);
        assert_relative_eq!(sizer.volatility_adjusted_size(100.0, Some(2.0)), 20.0);
        assert_relative_eq!(sizer.volatility_adjusted_size(100.0, Some(4.0)), 15.0);
        assert_relative_eq!(sizer.volatility_adjusted_size(100.0, Some(6.0)), 10.0);
    }

    #[test]
    fn heat_adjustment_bands() {
        let sizer = PositionSizer::default();
        let ctx = |exposure| PortfolioContext { total_risk_exposure: exposure };
        assert_eq!(sizer.heat_adjustment(None), 1.0);
        assert_eq!(sizer.heat_adjustment(Some(&ctx(1_000.0))), 1.0);
        assert_eq!(sizer.heat_adjustment(Some(&ctx(4_800.0))), 0.5);
        assert_eq!(sizer.heat_adjustment(Some(&ctx(6_000.0))), 0.1);
    }

    #[test]
    fn blended_size_for_typical_signal() {
        let sizer = PositionSizer::default();
        let result = sizer.size(&request(60.0, 100.0, 95.0), None);
        // mean(100, 20, 20) = 46.67; caps are 100 and 400 shares
        assert_eq!(result.shares, 46);
        assert_relative_eq!(result.position_value, 4666.67);
        assert_relative_eq!(result.portfolio_percentage, 4.67);
        assert_relative_eq!(result.risk_per_share, 5.0);
        assert_relative_eq!(result.max_risk_amount, 233.33);
        assert!(result.error.is_none());
    }

    #[test]
    fn risk_budget_caps_wide_stops() {
        let sizer = PositionSizer::default();
        // risk-based cap: 2000 / 80 = 25 shares
        let result = sizer.size(&request(90.0, 100.0, 20.0), None);
        assert_eq!(result.shares, 25);
        assert_relative_eq!(result.max_risk_amount, 2000.0);
    }

    #[test]
    fn missing_stop_defaults_to_five_percent() {
        let sizer = PositionSizer::default();
        let req = SizingRequest { stop_loss: None, ..request(60.0, 100.0, 0.0) };
        let result = sizer.size(&req, None);
        assert_relative_eq!(result.risk_per_share, 5.0);
    }

    #[test]
    fn zero_risk_per_share_falls_back() {
        let sizer = PositionSizer::default();
        let result = sizer.size(&request(60.0, 100.0, 100.0), None);
        assert_eq!(result.shares, 1);
        assert!(result.error.is_some());
        assert_relative_eq!(result.risk_per_share, 5.0);
        assert_relative_eq!(result.max_risk_amount, 5.0);
    }

    #[test]
    fn non_positive_entry_falls_back() {
        let sizer = PositionSizer::default();
        let result = sizer.size(&request(60.0, 0.0, 1.0), None);
        assert_eq!(result.shares, 1);
        assert!(result.error.is_some());
    }

    #[test]
    fn tiny_size_is_floored_at_one_share() {
        let sizer = PositionSizer::new(RiskConfig {
            portfolio_value: 1_000.0,
            max_portfolio_risk: 0.02,
        });
        let result = sizer.size(&request(10.0, 5_000.0, 4_900.0), None);
        assert_eq!(result.shares, 1);
        assert!(result.error.is_none());
    }

    proptest! {
        #[test]
        fn shares_stay_within_caps(
            confidence in 0.0f64..=100.0,
            entry in 1.0f64..1_000.0,
            stop_frac in 0.01f64..0.5,
            exposure in 0.0f64..10_000.0,
        ) {
            let sizer = PositionSizer::default();
            let stop = entry * (1.0 - stop_frac);
            let ctx = PortfolioContext { total_risk_exposure: exposure };
            let result = sizer.size(&request(confidence, entry, stop), Some(&ctx));

            prop_assert!(result.shares >= 1);
            prop_assert!(result.kelly_size >= 0.0);

            let max_shares = 100_000.0 * 0.10 / entry;
            let risk_shares = 100_000.0 * 0.02 / (entry - stop).abs();
            let cap = max_shares.min(risk_shares);
            if cap >= 1.0 {
                prop_assert!(result.shares as f64 <= cap);
            }
        }
    }
}
