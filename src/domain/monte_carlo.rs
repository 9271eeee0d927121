//! Monte Carlo outcome simulation for a single trade idea.
//!
//! Price paths follow a random walk whose drift is derived from signal
//! confidence. This is a heuristic for ranking ideas, not a calibrated market
//! model. Outcomes are classified stop-first: any path touching the stop is a
//! stop-out, even if it reached the target earlier.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;
use std::fmt;
use tracing::error;

use super::error::EngineError;
use super::signal::{Signal, DEFAULT_ATR_FRACTION};
use super::stats::{mean, percentile, population_std, round_to};

/// Simulated prices never fall below this floor.
pub const MIN_SIMULATED_PRICE: f64 = 0.01;
/// Outcomes closer to zero than this count as breakeven.
const BREAKEVEN_BAND: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    pub num_simulations: usize,
    pub time_horizon: usize,
    /// Fixed seed for reproducible runs; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            num_simulations: 5000,
            time_horizon: 20,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloParams {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence_score: f64,
    pub atr: Option<f64>,
    pub num_simulations: usize,
    pub time_horizon: usize,
}

impl MonteCarloParams {
    pub fn from_signal(signal: &Signal, config: &MonteCarloConfig) -> Self {
        MonteCarloParams {
            entry_price: signal.entry_price,
            stop_loss: signal.resolved_stop_loss(),
            take_profit: signal.resolved_take_profit(),
            confidence_score: signal.confidence(),
            atr: signal.atr(),
            num_simulations: config.num_simulations,
            time_horizon: config.time_horizon,
        }
    }

    fn daily_volatility(&self) -> f64 {
        let atr = self
            .atr
            .filter(|a| a.is_finite() && *a > 0.0)
            .unwrap_or(self.entry_price * DEFAULT_ATR_FRACTION);
        atr / self.entry_price
    }

    fn drift(&self) -> f64 {
        (self.confidence_score / 100.0 - 0.5) * 0.1
    }
}

/// Summary statistics, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    pub expected_return: f64,
    pub win_rate: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub profit_factor: f64,
    pub var_95: f64,
    pub cvar_95: f64,
    pub max_gain: f64,
    pub max_loss: f64,
    pub std_deviation: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutcomeProbabilities {
    pub profit: f64,
    pub loss: f64,
    pub breakeven: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulationRecommendation {
    #[serde(rename = "STRONG BUY - Favorable risk/reward profile with high win probability")]
    StrongBuy,
    #[serde(rename = "BUY - Positive expected return with acceptable risk")]
    Buy,
    #[serde(rename = "HOLD - Neutral expected return, monitor closely")]
    Hold,
    #[serde(rename = "AVOID - Poor risk/reward profile, high downside risk")]
    Avoid,
    #[serde(rename = "CAUTION - Mixed signals, consider reducing position size")]
    Caution,
    #[serde(rename = "Unable to perform simulation due to error")]
    Unavailable,
}

impl SimulationRecommendation {
    /// Ordinal cut points on fractional expected return, VaR-95 and win rate.
    pub fn from_stats(expected_return: f64, var_95: f64, win_rate: f64) -> Self {
        if expected_return > 0.05 && var_95 > -0.10 && win_rate > 0.60 {
            SimulationRecommendation::StrongBuy
        } else if expected_return > 0.02 && var_95 > -0.15 && win_rate > 0.50 {
            SimulationRecommendation::Buy
        } else if expected_return > -0.02 && var_95 > -0.20 {
            SimulationRecommendation::Hold
        } else if expected_return < -0.05 || var_95 < -0.25 {
            SimulationRecommendation::Avoid
        } else {
            SimulationRecommendation::Caution
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SimulationRecommendation::StrongBuy => {
                "STRONG BUY - Favorable risk/reward profile with high win probability"
            }
            SimulationRecommendation::Buy => "BUY - Positive expected return with acceptable risk",
            SimulationRecommendation::Hold => "HOLD - Neutral expected return, monitor closely",
            SimulationRecommendation::Avoid => {
                "AVOID - Poor risk/reward profile, high downside risk"
            }
            SimulationRecommendation::Caution => {
                "CAUTION - Mixed signals, consider reducing position size"
            }
            SimulationRecommendation::Unavailable => "Unable to perform simulation due to error",
        }
    }
}

impl fmt::Display for SimulationRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonteCarloResult {
    pub simulation_results: SimulationStats,
    pub outcome_probabilities: OutcomeProbabilities,
    pub percentiles: Percentiles,
    pub recommendation: SimulationRecommendation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MonteCarloResult {
    pub fn failed(reason: String) -> Self {
        MonteCarloResult {
            simulation_results: SimulationStats::default(),
            outcome_probabilities: OutcomeProbabilities::default(),
            percentiles: Percentiles::default(),
            recommendation: SimulationRecommendation::Unavailable,
            error: Some(reason),
        }
    }
}

/// Run the simulation with the caller's random source. Never fails: invalid
/// parameters yield a zeroed result with an error annotation.
pub fn simulate<R: Rng + ?Sized>(params: &MonteCarloParams, rng: &mut R) -> MonteCarloResult {
    match try_simulate(params, rng) {
        Ok(result) => result,
        Err(e) => {
            error!("error in Monte Carlo simulation: {e}");
            MonteCarloResult::failed(e.to_string())
        }
    }
}

/// Run with a generator built from `config` (seeded when a seed is set).
pub fn simulate_with_config(params: &MonteCarloParams, config: &MonteCarloConfig) -> MonteCarloResult {
    let mut rng = config.rng();
    simulate(params, &mut rng)
}

pub fn try_simulate<R: Rng + ?Sized>(
    params: &MonteCarloParams,
    rng: &mut R,
) -> Result<MonteCarloResult, EngineError> {
    validate(params)?;

    let outcomes = simulate_outcomes(params, rng);
    summarize(&outcomes)
}

fn validate(params: &MonteCarloParams) -> Result<(), EngineError> {
    if params.num_simulations == 0 {
        return Err(EngineError::computation(
            "monte carlo",
            "num_simulations must be greater than zero",
        ));
    }
    if !(params.entry_price.is_finite() && params.entry_price > 0.0) {
        return Err(EngineError::computation(
            "monte carlo",
            format!("entry price must be positive, got {}", params.entry_price),
        ));
    }
    if !(params.stop_loss.is_finite()
        && params.take_profit.is_finite()
        && params.confidence_score.is_finite())
    {
        return Err(EngineError::computation(
            "monte carlo",
            "stop_loss, take_profit and confidence must be finite",
        ));
    }
    Ok(())
}

/// Fractional outcome of every simulated path.
pub fn simulate_outcomes<R: Rng + ?Sized>(params: &MonteCarloParams, rng: &mut R) -> Vec<f64> {
    let drift = params.drift();
    let volatility = params.daily_volatility();
    let entry = params.entry_price;
    let mut path = Vec::with_capacity(params.time_horizon + 1);

    (0..params.num_simulations)
        .map(|_| {
            path.clear();
            generate_path(&mut path, entry, drift, volatility, params.time_horizon, &mut *rng);
            classify_path(&path, entry, params.stop_loss, params.take_profit)
        })
        .collect()
}

fn generate_path<R: Rng + ?Sized>(
    path: &mut Vec<f64>,
    start_price: f64,
    drift: f64,
    volatility: f64,
    steps: usize,
    rng: &mut R,
) {
    let mut price = start_price;
    path.push(price);
    for _ in 0..steps {
        let shock: f64 = rng.sample(StandardNormal);
        price = (price * (1.0 + drift + volatility * shock)).max(MIN_SIMULATED_PRICE);
        path.push(price);
    }
}

/// Stop first, then target, then the final price, regardless of ordering in
/// time.
pub fn classify_path(path: &[f64], entry: f64, stop_loss: f64, take_profit: f64) -> f64 {
    if path.iter().any(|&p| p <= stop_loss) {
        (stop_loss - entry) / entry
    } else if path.iter().any(|&p| p >= take_profit) {
        (take_profit - entry) / entry
    } else {
        let last = path.last().copied().unwrap_or(entry);
        (last - entry) / entry
    }
}

fn summarize(outcomes: &[f64]) -> Result<MonteCarloResult, EngineError> {
    if outcomes.is_empty() {
        return Err(EngineError::InsufficientData {
            context: "monte carlo".into(),
            have: 0,
            need: 1,
        });
    }
    if outcomes.iter().any(|o| !o.is_finite()) {
        return Err(EngineError::computation("monte carlo", "non-finite outcome"));
    }

    let n = outcomes.len() as f64;
    let wins: Vec<f64> = outcomes.iter().copied().filter(|&o| o > 0.0).collect();
    let losses: Vec<f64> = outcomes.iter().copied().filter(|&o| o < 0.0).collect();
    let breakevens = outcomes.iter().filter(|o| o.abs() < BREAKEVEN_BAND).count();

    let win_rate = wins.len() as f64 / n;
    let average_win = mean(&wins);
    let average_loss = mean(&losses);
    let profit_factor = if average_loss != 0.0 {
        (average_win / average_loss).abs()
    } else {
        0.0
    };

    let mut sorted = outcomes.to_vec();
    sorted.sort_by(f64::total_cmp);

    let var_95 = percentile(&sorted, 5.0);
    let tail: Vec<f64> = sorted.iter().copied().filter(|&o| o <= var_95).collect();
    let cvar_95 = mean(&tail);
    let expected_return = mean(outcomes);

    let pct = |v: f64| round_to(v * 100.0, 2);

    Ok(MonteCarloResult {
        simulation_results: SimulationStats {
            expected_return: pct(expected_return),
            win_rate: pct(win_rate),
            average_win: pct(average_win),
            average_loss: pct(average_loss),
            profit_factor: round_to(profit_factor, 2),
            var_95: pct(var_95),
            cvar_95: pct(cvar_95),
            max_gain: pct(sorted[sorted.len() - 1]),
            max_loss: pct(sorted[0]),
            std_deviation: pct(population_std(outcomes)),
        },
        outcome_probabilities: OutcomeProbabilities {
            profit: pct(win_rate),
            loss: pct(losses.len() as f64 / n),
            breakeven: pct(breakevens as f64 / n),
        },
        percentiles: Percentiles {
            p10: pct(percentile(&sorted, 10.0)),
            p25: pct(percentile(&sorted, 25.0)),
            p50: pct(percentile(&sorted, 50.0)),
            p75: pct(percentile(&sorted, 75.0)),
            p90: pct(percentile(&sorted, 90.0)),
        },
        recommendation: SimulationRecommendation::from_stats(expected_return, var_95, win_rate),
        error: None,
    })
}
