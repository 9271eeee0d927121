//! Cross-asset correlation and diversification metrics.

use serde::Serialize;
use std::fmt;

use super::error::EngineError;
use super::stats::{mean, pearson, round_to, sample_covariance, sample_variance};

/// Pairs with an absolute correlation above this are flagged.
pub const HIGH_CORRELATION_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiversificationScore {
    #[serde(rename = "POOR - Too few assets")]
    TooFewAssets,
    #[serde(rename = "POOR - High correlation between assets")]
    HighlyCorrelated,
    #[serde(rename = "FAIR - Moderate correlation, consider more diverse assets")]
    Fair,
    #[serde(rename = "GOOD - Well diversified portfolio")]
    Good,
    #[serde(rename = "EXCELLENT - Highly diversified portfolio")]
    Excellent,
}

impl DiversificationScore {
    pub fn assess(average_correlation: f64, num_assets: usize) -> Self {
        if num_assets < 3 {
            DiversificationScore::TooFewAssets
        } else if average_correlation > 0.8 {
            DiversificationScore::HighlyCorrelated
        } else if average_correlation > 0.6 {
            DiversificationScore::Fair
        } else if average_correlation > 0.4 {
            DiversificationScore::Good
        } else {
            DiversificationScore::Excellent
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DiversificationScore::TooFewAssets => "POOR - Too few assets",
            DiversificationScore::HighlyCorrelated => "POOR - High correlation between assets",
            DiversificationScore::Fair => {
                "FAIR - Moderate correlation, consider more diverse assets"
            }
            DiversificationScore::Good => "GOOD - Well diversified portfolio",
            DiversificationScore::Excellent => "EXCELLENT - Highly diversified portfolio",
        }
    }
}

impl fmt::Display for DiversificationScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub asset1: String,
    pub asset2: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioCorrelationResult {
    pub assets: Vec<String>,
    /// Row/column order follows `assets`. Values rounded to 3 places.
    pub correlation_matrix: Vec<Vec<f64>>,
    pub average_correlation: f64,
    pub diversification_ratio: f64,
    pub high_correlation_pairs: Vec<CorrelatedPair>,
    pub diversification_score: DiversificationScore,
}

/// `returns` is time-major: one row per period, one column per asset.
pub fn calculate_portfolio_correlation(
    assets: &[String],
    returns: &[Vec<f64>],
) -> Result<PortfolioCorrelationResult, EngineError> {
    if assets.is_empty() || returns.is_empty() {
        return Err(EngineError::InsufficientData {
            context: "portfolio correlation".into(),
            have: returns.len(),
            need: 2,
        });
    }
    if let Some((row, width)) = returns
        .iter()
        .enumerate()
        .map(|(i, r)| (i, r.len()))
        .find(|(_, len)| *len != assets.len())
    {
        return Err(EngineError::computation(
            "portfolio correlation",
            format!(
                "row {row} has {width} returns but {} assets were given",
                assets.len()
            ),
        ));
    }
    if returns.len() < 2 {
        return Err(EngineError::InsufficientData {
            context: "portfolio correlation".into(),
            have: returns.len(),
            need: 2,
        });
    }
    if returns.iter().flatten().any(|r| !r.is_finite()) {
        return Err(EngineError::computation(
            "portfolio correlation",
            "returns must be finite",
        ));
    }

    let columns = transpose(returns, assets.len());
    let n = columns.len();

    let mut matrix = vec![vec![0.0; n]; n];
    let mut upper = Vec::with_capacity(n * (n - 1) / 2);
    let mut pairs = Vec::new();

    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let corr = pearson(&columns[i], &columns[j]);
            matrix[i][j] = round_to(corr, 3);
            matrix[j][i] = round_to(corr, 3);
            upper.push(corr);
            if corr.abs() > HIGH_CORRELATION_THRESHOLD {
                pairs.push(CorrelatedPair {
                    asset1: assets[i].clone(),
                    asset2: assets[j].clone(),
                    correlation: round_to(corr, 3),
                });
            }
        }
    }

    let average_correlation = mean(&upper);

    Ok(PortfolioCorrelationResult {
        assets: assets.to_vec(),
        correlation_matrix: matrix,
        average_correlation: round_to(average_correlation, 3),
        diversification_ratio: round_to(diversification_ratio(&columns), 3),
        high_correlation_pairs: pairs,
        diversification_score: DiversificationScore::assess(average_correlation, assets.len()),
    })
}

/// Equal-weighted average variance over equal-weighted portfolio variance.
/// Falls back to 1 when the portfolio has no variance.
pub fn diversification_ratio(columns: &[Vec<f64>]) -> f64 {
    let n = columns.len();
    if n == 0 {
        return 1.0;
    }
    let w = 1.0 / n as f64;

    let mut portfolio_variance = 0.0;
    for a in columns {
        for b in columns {
            portfolio_variance += w * w * sample_covariance(a, b);
        }
    }
    let weighted_variance: f64 = columns.iter().map(|c| w * sample_variance(c)).sum();

    if portfolio_variance > 0.0 {
        weighted_variance / portfolio_variance
    } else {
        1.0
    }
}

fn transpose(rows: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    (0..width)
        .map(|col| rows.iter().map(|row| row[col]).collect())
        .collect()
}
