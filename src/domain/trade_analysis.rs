//! Forward-looking trade analysis: combines position sizing with the Monte
//! Carlo outcome distribution into portfolio-impact scenarios, a
//! recommendation and hedging suggestions.

use rand::Rng;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use super::monte_carlo::{simulate, MonteCarloConfig, MonteCarloParams, MonteCarloResult};
use super::position_sizing::{
    PortfolioContext, PositionSizer, PositionSizingResult, RiskConfig, SizingRequest,
};
use super::signal::Signal;
use super::stats::round_to;

/// ATR/entry above this is treated as high volatility.
const HIGH_VOLATILITY_RATIO: f64 = 0.05;
/// Worst-case portfolio loss (percent) above which size should come down.
const HIGH_IMPACT_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeRecommendation {
    #[serde(rename = "STRONG BUY - Excellent risk/reward with minimal portfolio impact")]
    StrongBuy,
    #[serde(rename = "BUY - Positive expected return with acceptable risk")]
    Buy,
    #[serde(rename = "NEUTRAL - Consider smaller position or wait for better setup")]
    Neutral,
    #[serde(rename = "AVOID - Poor risk/reward profile or excessive portfolio risk")]
    Avoid,
    #[serde(rename = "Unable to analyze trade due to error")]
    Unavailable,
}

impl TradeRecommendation {
    /// Inputs are percentages: expected return, win rate and the absolute
    /// worst-case portfolio impact.
    pub fn from_scenario(
        expected_return: f64,
        win_rate: f64,
        risk_reward_ratio: f64,
        worst_impact: f64,
    ) -> Self {
        if expected_return > 3.0 && win_rate > 60.0 && risk_reward_ratio > 2.0 && worst_impact < 2.0
        {
            TradeRecommendation::StrongBuy
        } else if expected_return > 1.0 && win_rate > 50.0 && risk_reward_ratio > 1.5 {
            TradeRecommendation::Buy
        } else if expected_return > -1.0 && worst_impact < 1.0 {
            TradeRecommendation::Neutral
        } else {
            TradeRecommendation::Avoid
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TradeRecommendation::StrongBuy => {
                "STRONG BUY - Excellent risk/reward with minimal portfolio impact"
            }
            TradeRecommendation::Buy => "BUY - Positive expected return with acceptable risk",
            TradeRecommendation::Neutral => {
                "NEUTRAL - Consider smaller position or wait for better setup"
            }
            TradeRecommendation::Avoid => {
                "AVOID - Poor risk/reward profile or excessive portfolio risk"
            }
            TradeRecommendation::Unavailable => "Unable to analyze trade due to error",
        }
    }
}

impl fmt::Display for TradeRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Scenario {
    /// Trade return in percent.
    pub return_pct: f64,
    /// Effect on the whole portfolio in percent.
    pub portfolio_impact: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scenarios {
    pub best_case: Scenario,
    pub expected_case: Scenario,
    pub worst_case: Scenario,
    pub stop_loss_case: Scenario,
}

impl Scenarios {
    pub fn build(
        monte_carlo: &MonteCarloResult,
        sizing: &PositionSizingResult,
        portfolio_value: f64,
    ) -> Self {
        let position_value = sizing.position_value;
        let impact = |return_pct: f64| {
            if portfolio_value > 0.0 {
                position_value * return_pct / 100.0 / portfolio_value * 100.0
            } else {
                0.0
            }
        };
        let at = |return_pct: f64| Scenario {
            return_pct,
            portfolio_impact: impact(return_pct),
        };

        let stop_return = if position_value > 0.0 {
            -sizing.max_risk_amount / position_value * 100.0
        } else {
            0.0
        };
        let stop_impact = if portfolio_value > 0.0 {
            -sizing.max_risk_amount / portfolio_value * 100.0
        } else {
            0.0
        };

        Scenarios {
            best_case: at(monte_carlo.percentiles.p90),
            expected_case: at(monte_carlo.simulation_results.expected_return),
            worst_case: at(monte_carlo.percentiles.p10),
            stop_loss_case: Scenario {
                return_pct: stop_return,
                portfolio_impact: stop_impact,
            },
        }
    }

    /// |best / worst|, or 0 when the worst case is flat.
    pub fn risk_reward_ratio(&self) -> f64 {
        if self.worst_case.return_pct != 0.0 {
            (self.best_case.return_pct / self.worst_case.return_pct).abs()
        } else {
            0.0
        }
    }

    fn rounded(&self) -> Self {
        let r = |s: Scenario| Scenario {
            return_pct: round_to(s.return_pct, 2),
            portfolio_impact: round_to(s.portfolio_impact, 4),
        };
        Scenarios {
            best_case: r(self.best_case),
            expected_case: r(self.expected_case),
            worst_case: r(self.worst_case),
            stop_loss_case: r(self.stop_loss_case),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeAnalysis {
    pub asset: String,
    pub monte_carlo_results: MonteCarloResult,
    pub position_sizing: PositionSizingResult,
    pub scenarios: Scenarios,
    pub risk_reward_ratio: f64,
    pub recommendation: TradeRecommendation,
    pub hedging_suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Qualitative hedging ideas for a signal given its scenarios.
pub fn hedging_suggestions(signal: &Signal, scenarios: &Scenarios) -> Vec<String> {
    let mut suggestions = Vec::new();

    if scenarios.worst_case.portfolio_impact.abs() > HIGH_IMPACT_PCT {
        suggestions.push("Consider reducing position size due to high portfolio impact".to_string());
    }

    let atr = signal.atr().unwrap_or(0.0);
    if signal.entry_price > 0.0 && atr / signal.entry_price > HIGH_VOLATILITY_RATIO {
        suggestions.push(
            "High volatility detected - consider protective options strategies".to_string(),
        );
    }

    if let Some(sector) = signal.sector() {
        suggestions.push(format!(
            "Monitor {sector} sector exposure for concentration risk"
        ));
    }

    suggestions.push(
        "Consider market hedging if position represents significant portfolio exposure"
            .to_string(),
    );
    suggestions
}

/// Composes the position sizer and the Monte Carlo engine.
#[derive(Debug, Clone, Default)]
pub struct TradeAnalyzer {
    sizer: PositionSizer,
    monte_carlo: MonteCarloConfig,
}

impl TradeAnalyzer {
    pub fn new(risk: RiskConfig, monte_carlo: MonteCarloConfig) -> Self {
        TradeAnalyzer {
            sizer: PositionSizer::new(risk),
            monte_carlo,
        }
    }

    /// Analyse with a generator built from the Monte Carlo configuration.
    pub fn analyze_with_config(
        &self,
        signal: &Signal,
        portfolio: Option<&PortfolioContext>,
    ) -> TradeAnalysis {
        let mut rng = self.monte_carlo.rng();
        self.analyze(signal, portfolio, &mut rng)
    }

    /// Never fails. Component errors are carried through in their own
    /// results and summarised in `error`.
    pub fn analyze<R: Rng + ?Sized>(
        &self,
        signal: &Signal,
        portfolio: Option<&PortfolioContext>,
        rng: &mut R,
    ) -> TradeAnalysis {
        let params = MonteCarloParams::from_signal(signal, &self.monte_carlo);
        let monte_carlo = simulate(&params, rng);
        let sizing = self
            .sizer
            .size(&SizingRequest::from_signal(signal), portfolio);

        let portfolio_value = self.sizer.config().portfolio_value;
        let scenarios = Scenarios::build(&monte_carlo, &sizing, portfolio_value);
        let risk_reward_ratio = scenarios.risk_reward_ratio();

        let error = match (&monte_carlo.error, &sizing.error) {
            (None, None) => None,
            (Some(mc), None) => Some(format!("monte carlo: {mc}")),
            (None, Some(sz)) => Some(format!("position sizing: {sz}")),
            (Some(mc), Some(sz)) => Some(format!("monte carlo: {mc}; position sizing: {sz}")),
        };

        let recommendation = if monte_carlo.error.is_some() {
            TradeRecommendation::Unavailable
        } else {
            TradeRecommendation::from_scenario(
                monte_carlo.simulation_results.expected_return,
                monte_carlo.simulation_results.win_rate,
                risk_reward_ratio,
                scenarios.worst_case.portfolio_impact.abs(),
            )
        };

        if let Some(e) = &error {
            warn!("trade analysis for {} degraded: {e}", signal.asset);
        } else {
            info!(
                "{}: {} shares, expected {:+.2}%, {}",
                signal.asset, sizing.shares, monte_carlo.simulation_results.expected_return,
                recommendation
            );
        }

        TradeAnalysis {
            asset: signal.asset.clone(),
            hedging_suggestions: hedging_suggestions(signal, &scenarios),
            scenarios: scenarios.rounded(),
            risk_reward_ratio: round_to(risk_reward_ratio, 2),
            recommendation,
            monte_carlo_results: monte_carlo,
            position_sizing: sizing,
            error,
        }
    }
}
