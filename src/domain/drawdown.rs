//! Drawdown metrics over a portfolio value series.

use serde::Serialize;
use std::fmt;

use super::error::EngineError;
use super::stats::{mean, round_to};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrawdownRisk {
    #[serde(rename = "HIGH RISK - Significant drawdown detected")]
    High,
    #[serde(rename = "MEDIUM RISK - Moderate drawdown")]
    Medium,
    #[serde(rename = "CAUTION - Currently in drawdown")]
    Caution,
    #[serde(rename = "LOW RISK - Acceptable drawdown levels")]
    Low,
}

impl DrawdownRisk {
    /// Both inputs are non-positive fractions.
    pub fn assess(max_drawdown: f64, current_drawdown: f64) -> Self {
        if max_drawdown < -0.2 {
            DrawdownRisk::High
        } else if max_drawdown < -0.1 {
            DrawdownRisk::Medium
        } else if current_drawdown < -0.05 {
            DrawdownRisk::Caution
        } else {
            DrawdownRisk::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DrawdownRisk::High => "HIGH RISK - Significant drawdown detected",
            DrawdownRisk::Medium => "MEDIUM RISK - Moderate drawdown",
            DrawdownRisk::Caution => "CAUTION - Currently in drawdown",
            DrawdownRisk::Low => "LOW RISK - Acceptable drawdown levels",
        }
    }
}

impl fmt::Display for DrawdownRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownResult {
    /// Percent, non-positive.
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    /// Mean episode length in observations.
    pub avg_drawdown_duration: f64,
    pub max_drawdown_duration: usize,
    pub recovery_factor: f64,
    /// Percent change from the first to the last value.
    pub total_return: f64,
    pub risk_assessment: DrawdownRisk,
}

/// Per-point drawdown from the running peak, as non-positive fractions.
pub fn drawdown_series(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            peak = peak.max(v);
            (v - peak) / peak
        })
        .collect()
}

/// Lengths of contiguous runs below the running peak. A run still open at
/// the end of the series is included.
pub fn drawdown_episodes(drawdowns: &[f64]) -> Vec<usize> {
    let mut episodes = Vec::new();
    let mut start: Option<usize> = None;

    for (i, &dd) in drawdowns.iter().enumerate() {
        match (dd < 0.0, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                episodes.push(i - s);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        episodes.push(drawdowns.len() - s);
    }
    episodes
}

pub fn check_drawdown(values: &[f64]) -> Result<DrawdownResult, EngineError> {
    if values.len() < 2 {
        return Err(EngineError::InsufficientData {
            context: "drawdown".into(),
            have: values.len(),
            need: 2,
        });
    }
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(EngineError::computation(
            "drawdown",
            "portfolio values must be positive and finite",
        ));
    }

    let drawdowns = drawdown_series(values);
    let max_drawdown = drawdowns.iter().copied().fold(0.0_f64, f64::min);
    let current_drawdown = drawdowns.last().copied().unwrap_or(0.0);

    let episodes = drawdown_episodes(&drawdowns);
    let durations: Vec<f64> = episodes.iter().map(|&e| e as f64).collect();
    let max_duration = episodes.iter().copied().max().unwrap_or(0);

    let first = values[0];
    let last = values[values.len() - 1];
    let total_return = (last - first) / first;
    let recovery_factor = if max_drawdown != 0.0 {
        (total_return / max_drawdown).abs()
    } else {
        0.0
    };

    Ok(DrawdownResult {
        max_drawdown: round_to(max_drawdown * 100.0, 2),
        current_drawdown: round_to(current_drawdown * 100.0, 2),
        avg_drawdown_duration: round_to(mean(&durations), 1),
        max_drawdown_duration: max_duration,
        recovery_factor: round_to(recovery_factor, 2),
        total_return: round_to(total_return * 100.0, 2),
        risk_assessment: DrawdownRisk::assess(max_drawdown, current_drawdown),
    })
}
