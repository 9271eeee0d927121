//! Configuration validation.
//!
//! Every key is optional and falls back to the engine defaults; a key that is
//! present must parse and lie in range.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::EngineError;
use crate::ports::clock_port::Clock;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_portfolio_value(config)?;
    validate_max_portfolio_risk(config)?;
    Ok(())
}

pub fn validate_monte_carlo_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_positive_int(config, "monte_carlo", "num_simulations")?;
    validate_positive_int(config, "monte_carlo", "time_horizon")?;
    validate_seed(config)?;
    Ok(())
}

/// Resolved `[backtest]` window: configured dates, else full history up to
/// the clock's today.
pub fn backtest_window(
    config: &dyn ConfigPort,
    clock: &dyn Clock,
) -> Result<BacktestConfig, EngineError> {
    let defaults = BacktestConfig::ending_today(clock);
    let start_date = match config.get_string("backtest", "start_date") {
        Some(s) => parse_date(&s, "start_date")?,
        None => defaults.start_date,
    };
    let end_date = match config.get_string("backtest", "end_date") {
        Some(s) => parse_date(&s, "end_date")?,
        None => defaults.end_date,
    };

    if start_date >= end_date {
        return Err(EngineError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }
    Ok(BacktestConfig {
        start_date,
        end_date,
    })
}

fn validate_portfolio_value(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = parse_double(config, "engine", "portfolio_value")?.unwrap_or(100_000.0);
    if !(value.is_finite() && value > 0.0) {
        return Err(EngineError::ConfigInvalid {
            section: "engine".to_string(),
            key: "portfolio_value".to_string(),
            reason: "portfolio_value must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_max_portfolio_risk(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = parse_double(config, "engine", "max_portfolio_risk")?.unwrap_or(0.02);
    if value <= 0.0 || value > 1.0 {
        return Err(EngineError::ConfigInvalid {
            section: "engine".to_string(),
            key: "max_portfolio_risk".to_string(),
            reason: "max_portfolio_risk must be in (0, 1]".to_string(),
        });
    }
    Ok(())
}

fn validate_positive_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), EngineError> {
    if let Some(value) = parse_int(config, section, key)? {
        if value < 1 {
            return Err(EngineError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("{key} must be at least 1"),
            });
        }
    }
    Ok(())
}

fn validate_seed(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(seed) = parse_int(config, "monte_carlo", "seed")? {
        if seed < 0 {
            return Err(EngineError::ConfigInvalid {
                section: "monte_carlo".to_string(),
                key: "seed".to_string(),
                reason: "seed must be non-negative".to_string(),
            });
        }
    }
    Ok(())
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| EngineError::ConfigInvalid {
        section: "backtest".to_string(),
        key: field.to_string(),
        reason: format!("invalid {} format, expected YYYY-MM-DD", field),
    })
}

/// `None` when the key is absent; an error when present but not a number.
pub fn parse_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, EngineError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => s.trim().parse::<f64>().map(Some).map_err(|_| EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("'{s}' is not a number"),
        }),
    }
}

pub fn parse_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, EngineError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => s.trim().parse::<i64>().map(Some).map_err(|_| EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("'{s}' is not an integer"),
        }),
    }
}
