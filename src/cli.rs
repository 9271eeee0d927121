//! CLI definition and dispatch.
//!
//! Every subcommand prints its result as JSON on stdout. Diagnostics go to
//! stderr.

use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{load_returns_matrix, load_signal_records, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::system_clock::SystemClock;
use crate::domain::backtest::{BacktestConfig, Backtester};
use crate::domain::config_validation::{
    backtest_window, validate_engine_config, validate_monte_carlo_config,
};
use crate::domain::correlation::calculate_portfolio_correlation;
use crate::domain::drawdown::check_drawdown;
use crate::domain::error::EngineError;
use crate::domain::monte_carlo::{simulate_with_config, MonteCarloConfig, MonteCarloParams};
use crate::domain::position_sizing::{PortfolioContext, PositionSizer, RiskConfig, SizingRequest};
use crate::domain::signal::{Direction, RiskLevel, Signal, TechnicalIndicators};
use crate::domain::stops::{dynamic_stop_loss, StopRequest, DEFAULT_TRAILING_FACTOR};
use crate::domain::trade::TradeSide;
use crate::domain::trade_analysis::TradeAnalyzer;
use crate::ports::clock_port::Clock;
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "signal-risk", about = "Signal backtesting and risk analysis")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a CSV batch of signals against bar files on disk
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        signals: PathBuf,
        /// Overrides [data] bars_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Size a position for one signal
    Size {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        signal: SignalArgs,
        /// Currency amount already at risk in open positions
        #[arg(long)]
        exposure: Option<f64>,
    },
    /// Monte Carlo outcome simulation for one signal
    Simulate {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        signal: SignalArgs,
        #[command(flatten)]
        monte_carlo: MonteCarloArgs,
    },
    /// Full trade analysis: sizing, simulation, scenarios and hedging
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        signal: SignalArgs,
        #[command(flatten)]
        monte_carlo: MonteCarloArgs,
        #[arg(long)]
        exposure: Option<f64>,
    },
    /// ATR trailing stop for an open position
    Stop {
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        current: f64,
        #[arg(long)]
        atr: f64,
        #[arg(long, default_value = "long")]
        direction: Direction,
        #[arg(long, default_value_t = DEFAULT_TRAILING_FACTOR)]
        factor: f64,
    },
    /// Drawdown metrics for a comma-separated value series
    Drawdown {
        #[arg(long, value_delimiter = ',', required = true)]
        values: Vec<f64>,
    },
    /// Correlation and diversification from a CSV of returns
    Correlation {
        #[arg(long)]
        returns: PathBuf,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct SignalArgs {
    #[arg(long, default_value = "SIGNAL")]
    pub asset: String,
    #[arg(long, default_value = "long")]
    pub direction: Direction,
    #[arg(long)]
    pub entry: f64,
    #[arg(long)]
    pub stop: Option<f64>,
    #[arg(long)]
    pub target: Option<f64>,
    #[arg(long, default_value_t = 50.0)]
    pub confidence: f64,
    #[arg(long, default_value = "medium")]
    pub risk_level: RiskLevel,
    #[arg(long)]
    pub atr: Option<f64>,
    #[arg(long)]
    pub sector: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub horizon_days: u32,
}

impl SignalArgs {
    pub fn to_signal(&self) -> Signal {
        Signal {
            asset: self.asset.to_uppercase(),
            direction: self.direction,
            entry_price: self.entry,
            stop_loss: self.stop,
            take_profit: self.target,
            confidence_score: self.confidence,
            risk_level: self.risk_level,
            time_horizon_days: self.horizon_days,
            sector: self.sector.clone(),
            technical: TechnicalIndicators { atr: self.atr },
            created_at: Local::now().naive_local(),
        }
    }
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct MonteCarloArgs {
    /// Overrides [monte_carlo] num_simulations
    #[arg(long)]
    pub simulations: Option<usize>,
    /// Overrides [monte_carlo] time_horizon
    #[arg(long)]
    pub horizon: Option<usize>,
    /// Overrides [monte_carlo] seed
    #[arg(long)]
    pub seed: Option<u64>,
}

impl MonteCarloArgs {
    fn apply(&self, mut config: MonteCarloConfig) -> MonteCarloConfig {
        if let Some(n) = self.simulations {
            config.num_simulations = n;
        }
        if let Some(h) = self.horizon {
            config.time_horizon = h;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            signals,
            data_dir,
            output,
        } => run_backtest(&config, &signals, data_dir.as_ref(), output.as_ref()),
        Command::Size {
            config,
            signal,
            exposure,
        } => run_size(config.as_ref(), &signal, exposure),
        Command::Simulate {
            config,
            signal,
            monte_carlo,
        } => run_simulate(config.as_ref(), &signal, &monte_carlo),
        Command::Analyze {
            config,
            signal,
            monte_carlo,
            exposure,
        } => run_analyze(config.as_ref(), &signal, &monte_carlo, exposure),
        Command::Stop {
            entry,
            current,
            atr,
            direction,
            factor,
        } => run_stop(entry, current, atr, direction, factor),
        Command::Drawdown { values } => run_drawdown(&values),
        Command::Correlation { returns } => run_correlation(&returns),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| fail(&err))
}

fn load_optional_config(path: Option<&PathBuf>) -> Result<Option<FileConfigAdapter>, ExitCode> {
    path.map(load_config).transpose()
}

fn fail(err: &EngineError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&EngineError::from(e)),
    }
}

pub fn build_risk_config(adapter: &dyn ConfigPort) -> Result<RiskConfig, EngineError> {
    validate_engine_config(adapter)?;
    let defaults = RiskConfig::default();
    Ok(RiskConfig {
        portfolio_value: adapter.get_double("engine", "portfolio_value", defaults.portfolio_value),
        max_portfolio_risk: adapter.get_double(
            "engine",
            "max_portfolio_risk",
            defaults.max_portfolio_risk,
        ),
    })
}

pub fn build_monte_carlo_config(adapter: &dyn ConfigPort) -> Result<MonteCarloConfig, EngineError> {
    validate_monte_carlo_config(adapter)?;
    let defaults = MonteCarloConfig::default();
    let seed = adapter
        .get_string("monte_carlo", "seed")
        .and_then(|s| s.trim().parse::<u64>().ok());
    Ok(MonteCarloConfig {
        num_simulations: adapter.get_int(
            "monte_carlo",
            "num_simulations",
            defaults.num_simulations as i64,
        ) as usize,
        time_horizon: adapter.get_int("monte_carlo", "time_horizon", defaults.time_horizon as i64)
            as usize,
        seed,
    })
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    clock: &dyn Clock,
) -> Result<BacktestConfig, EngineError> {
    backtest_window(adapter, clock)
}

/// `--data-dir` wins over `[data] bars_dir`.
pub fn resolve_bars_dir(
    override_dir: Option<&PathBuf>,
    adapter: &dyn ConfigPort,
) -> Result<PathBuf, EngineError> {
    match override_dir {
        Some(dir) => Ok(dir.clone()),
        None => adapter
            .get_string("data", "bars_dir")
            .map(PathBuf::from)
            .ok_or_else(|| EngineError::ConfigMissing {
                section: "data".into(),
                key: "bars_dir".into(),
            }),
    }
}

fn risk_config_from(adapter: Option<&FileConfigAdapter>) -> Result<RiskConfig, EngineError> {
    match adapter {
        Some(a) => build_risk_config(a),
        None => Ok(RiskConfig::default()),
    }
}

/// `[monte_carlo]` settings with command-line overrides applied on top.
pub fn monte_carlo_config_from(
    adapter: Option<&FileConfigAdapter>,
    overrides: &MonteCarloArgs,
) -> Result<MonteCarloConfig, EngineError> {
    let base = match adapter {
        Some(a) => build_monte_carlo_config(a)?,
        None => MonteCarloConfig::default(),
    };
    let config = overrides.apply(base);
    for (key, value) in [
        ("num_simulations", config.num_simulations),
        ("time_horizon", config.time_horizon),
    ] {
        if value == 0 {
            return Err(EngineError::ConfigInvalid {
                section: "monte_carlo".into(),
                key: key.into(),
                reason: format!("{key} must be at least 1"),
            });
        }
    }
    Ok(config)
}

fn run_backtest(
    config_path: &PathBuf,
    signals_path: &PathBuf,
    data_dir: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let bt_config = match build_backtest_config(&adapter, &SystemClock) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let bars_dir = match resolve_bars_dir(data_dir, &adapter) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let records = match load_signal_records(signals_path) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Backtesting {} signals from {} to {}",
        records.len(),
        bt_config.start_date,
        bt_config.end_date
    );

    let provider = CsvAdapter::new(bars_dir);
    let report = Backtester::new(&provider, bt_config).run(&records);

    if let Some(out) = output_path {
        let out = out.display().to_string();
        if let Err(e) = JsonReportAdapter::new().write(&report, &out) {
            return fail(&e);
        }
        eprintln!("Report written to {out}");
    }

    emit(&report)
}

fn run_size(config_path: Option<&PathBuf>, args: &SignalArgs, exposure: Option<f64>) -> ExitCode {
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let risk = match risk_config_from(adapter.as_ref()) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    let portfolio = exposure.map(|total_risk_exposure| PortfolioContext {
        total_risk_exposure,
    });
    let signal = args.to_signal();
    let result =
        PositionSizer::new(risk).size(&SizingRequest::from_signal(&signal), portfolio.as_ref());
    emit(&result)
}

fn run_simulate(
    config_path: Option<&PathBuf>,
    args: &SignalArgs,
    overrides: &MonteCarloArgs,
) -> ExitCode {
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let mc_config = match monte_carlo_config_from(adapter.as_ref(), overrides) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let params = MonteCarloParams::from_signal(&args.to_signal(), &mc_config);
    emit(&simulate_with_config(&params, &mc_config))
}

fn run_analyze(
    config_path: Option<&PathBuf>,
    args: &SignalArgs,
    overrides: &MonteCarloArgs,
    exposure: Option<f64>,
) -> ExitCode {
    let adapter = match load_optional_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let risk = match risk_config_from(adapter.as_ref()) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let mc_config = match monte_carlo_config_from(adapter.as_ref(), overrides) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    let portfolio = exposure.map(|total_risk_exposure| PortfolioContext {
        total_risk_exposure,
    });
    let analysis =
        TradeAnalyzer::new(risk, mc_config).analyze_with_config(&args.to_signal(), portfolio.as_ref());
    emit(&analysis)
}

fn run_stop(entry: f64, current: f64, atr: f64, direction: Direction, factor: f64) -> ExitCode {
    let side = match direction {
        Direction::Long => TradeSide::Long,
        Direction::Short => TradeSide::Short,
        Direction::Neutral => {
            return fail(&EngineError::malformed(
                "a stop needs a long or short position",
            ));
        }
    };
    emit(&dynamic_stop_loss(&StopRequest {
        entry_price: entry,
        current_price: current,
        atr,
        side,
        trailing_factor: factor,
    }))
}

fn run_drawdown(values: &[f64]) -> ExitCode {
    match check_drawdown(values) {
        Ok(result) => emit(&result),
        Err(e) => fail(&e),
    }
}

fn run_correlation(returns_path: &PathBuf) -> ExitCode {
    let (assets, rows) = match load_returns_matrix(returns_path) {
        Ok(m) => m,
        Err(e) => return fail(&e),
    };
    match calculate_portfolio_correlation(&assets, &rows) {
        Ok(result) => emit(&result),
        Err(e) => fail(&e),
    }
}
