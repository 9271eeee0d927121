//! CLI integration tests.
//!
//! Tests cover:
//! - Config builders (build_risk_config, build_monte_carlo_config, build_backtest_config)
//! - Bars directory resolution
//! - Backtest over CSV files on disk through the CSV and JSON adapters
//! - Subcommand dispatch and exit codes

mod common;

use common::*;
use signal_risk::adapters::csv_adapter::{load_signal_records, CsvAdapter};
use signal_risk::adapters::file_config_adapter::FileConfigAdapter;
use signal_risk::adapters::json_report_adapter::JsonReportAdapter;
use signal_risk::cli::{self, Cli, Command, MonteCarloArgs};
use signal_risk::domain::backtest::Backtester;
use signal_risk::domain::error::EngineError;
use signal_risk::ports::report_port::ReportPort;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[engine]
portfolio_value = 50000
max_portfolio_risk = 0.01

[backtest]
start_date = 2024-01-01
end_date = 2024-03-31

[monte_carlo]
num_simulations = 250
time_horizon = 15
seed = 17

[data]
bars_dir = /srv/bars
"#;

fn code(c: ExitCode) -> String {
    format!("{c:?}")
}

mod config_builders {
    use super::*;

    #[test]
    fn builds_every_section() {
        let file = write_temp_ini(VALID_INI);
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();

        let risk = cli::build_risk_config(&adapter).unwrap();
        assert_eq!(risk.portfolio_value, 50_000.0);
        assert_eq!(risk.max_portfolio_risk, 0.01);

        let mc = cli::build_monte_carlo_config(&adapter).unwrap();
        assert_eq!(mc.num_simulations, 250);
        assert_eq!(mc.time_horizon, 15);
        assert_eq!(mc.seed, Some(17));

        let clock = FixedClock(date("2030-01-01"));
        let bt = cli::build_backtest_config(&adapter, &clock).unwrap();
        assert_eq!(bt.start_date, date("2024-01-01"));
        assert_eq!(bt.end_date, date("2024-03-31"));
    }

    #[test]
    fn defaults_when_sections_absent() {
        let adapter = FileConfigAdapter::from_string("[data]\nbars_dir = bars\n").unwrap();

        let risk = cli::build_risk_config(&adapter).unwrap();
        assert_eq!(risk.portfolio_value, 100_000.0);
        assert_eq!(risk.max_portfolio_risk, 0.02);

        let mc = cli::build_monte_carlo_config(&adapter).unwrap();
        assert_eq!(mc.num_simulations, 5000);
        assert_eq!(mc.time_horizon, 20);
        assert_eq!(mc.seed, None);

        let clock = FixedClock(date("2024-06-30"));
        let bt = cli::build_backtest_config(&adapter, &clock).unwrap();
        assert_eq!(bt.start_date, date("1923-01-01"));
        assert_eq!(bt.end_date, date("2024-06-30"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[engine]\nmax_portfolio_risk = 2\n").unwrap();
        let err = cli::build_risk_config(&adapter).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "max_portfolio_risk"));
        assert_eq!(code(ExitCode::from(&err)), code(ExitCode::from(2)));

        let adapter = FileConfigAdapter::from_string("[monte_carlo]\nnum_simulations = 0\n").unwrap();
        assert!(cli::build_monte_carlo_config(&adapter).is_err());
    }

    #[test]
    fn zero_override_names_the_failing_key() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let horizon = MonteCarloArgs { simulations: None, horizon: Some(0), seed: None };
        let err = cli::monte_carlo_config_from(Some(&adapter), &horizon).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "time_horizon"));

        let sims = MonteCarloArgs { simulations: Some(0), horizon: None, seed: None };
        let err = cli::monte_carlo_config_from(None, &sims).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "num_simulations"));

        let ok = MonteCarloArgs { simulations: Some(10), horizon: Some(3), seed: Some(1) };
        let config = cli::monte_carlo_config_from(Some(&adapter), &ok).unwrap();
        assert_eq!((config.num_simulations, config.time_horizon, config.seed), (10, 3, Some(1)));
    }

    #[test]
    fn data_dir_override_wins() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let cli_dir = PathBuf::from("/tmp/other");
        assert_eq!(
            cli::resolve_bars_dir(Some(&cli_dir), &adapter).unwrap(),
            cli_dir
        );
        assert_eq!(
            cli::resolve_bars_dir(None, &adapter).unwrap(),
            PathBuf::from("/srv/bars")
        );
    }

    #[test]
    fn missing_bars_dir_is_config_missing() {
        let adapter = FileConfigAdapter::from_string("[engine]\n").unwrap();
        let err = cli::resolve_bars_dir(None, &adapter).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { ref key, .. } if key == "bars_dir"));
    }

    #[test]
    fn missing_config_file_maps_to_config_exit_code() {
        let result = cli::load_config(&PathBuf::from("/nonexistent/engine.ini"));
        assert_eq!(code(result.err().unwrap()), code(ExitCode::from(2)));
    }
}

mod on_disk_backtest {
    use super::*;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let bars_dir = dir.path().join("bars");
        fs::create_dir(&bars_dir).unwrap();
        fs::write(
            bars_dir.join("ACME.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-02,100,102,99,101,1000\n\
             2024-01-03,101,111,100,110,1000\n\
             2024-01-04,110,112,108,111,1000\n",
        )
        .unwrap();
        fs::write(
            bars_dir.join("DROP.csv"),
            "date,open,high,low,close,volume\n\
             2024-01-02,50,51,46,47,1000\n",
        )
        .unwrap();

        let signals = dir.path().join("signals.csv");
        fs::write(
            &signals,
            "asset,entry_date,direction,entry_price,stop_loss,take_profit,time_horizon\n\
             ACME,2024-01-02,long,100,95,110,5\n\
             DROP,2024-01-02,long,50,47.5,55,5\n\
             NOPE,2024-01-02,long,10,9,12,5\n\
             ,2024-01-02,long,10,9,12,5\n",
        )
        .unwrap();

        (dir, bars_dir, signals)
    }

    #[test]
    fn backtest_from_csv_files() {
        let (dir, bars_dir, signals) = setup();
        let records = load_signal_records(&signals).unwrap();
        assert_eq!(records.len(), 4);

        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config =
            cli::build_backtest_config(&adapter, &FixedClock(date("2030-01-01"))).unwrap();
        let provider = CsvAdapter::new(bars_dir);
        let report = Backtester::new(&provider, config).run(&records);

        assert_eq!(report.total_trades, 2);
        assert_eq!(report.wins, 1);
        assert_eq!(report.losses, 1);
        assert!((report.average_return_pct - 2.5).abs() < 1e-9);

        let out = dir.path().join("out").join("report.json");
        JsonReportAdapter::new()
            .write(&report, out.to_str().unwrap())
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["trade_details"][1]["exit_reason"], "stop_loss");
    }

    #[test]
    fn backtest_subcommand_writes_report() {
        let (dir, bars_dir, signals) = setup();
        let ini = write_temp_ini("[backtest]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n");
        let out = dir.path().join("report.json");

        let status = cli::run(Cli {
            command: Command::Backtest {
                config: ini.path().to_path_buf(),
                signals,
                data_dir: Some(bars_dir),
                output: Some(out.clone()),
            },
        });

        assert_eq!(code(status), code(ExitCode::SUCCESS));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["total_trades"], 2);
    }

    #[test]
    fn backtest_without_bars_dir_fails_with_config_code() {
        let (_dir, _bars_dir, signals) = setup();
        let ini = write_temp_ini("[backtest]\nstart_date = 2024-01-01\nend_date = 2024-12-31\n");

        let status = cli::run(Cli {
            command: Command::Backtest {
                config: ini.path().to_path_buf(),
                signals,
                data_dir: None,
                output: None,
            },
        });
        assert_eq!(code(status), code(ExitCode::from(2)));
    }
}

mod subcommands {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_drawdown_values() {
        let cli = Cli::try_parse_from(["signal-risk", "drawdown", "--values", "100,90,80,95"]).unwrap();
        match cli.command {
            Command::Drawdown { values } => assert_eq!(values, vec![100.0, 90.0, 80.0, 95.0]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn drawdown_with_one_value_is_computation_error() {
        let cli = Cli::try_parse_from(["signal-risk", "drawdown", "--values", "100"]).unwrap();
        assert_eq!(code(cli::run(cli)), code(ExitCode::from(5)));
    }

    #[test]
    fn rejects_unknown_direction() {
        let result = Cli::try_parse_from([
            "signal-risk", "size", "--entry", "100", "--direction", "sideways",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn size_and_simulate_succeed_without_config() {
        let size = Cli::try_parse_from([
            "signal-risk", "size", "--entry", "100", "--stop", "95", "--confidence", "70",
            "--risk-level", "low",
        ])
        .unwrap();
        assert_eq!(code(cli::run(size)), code(ExitCode::SUCCESS));

        let simulate = Cli::try_parse_from([
            "signal-risk", "simulate", "--entry", "100", "--simulations", "200", "--seed", "3",
        ])
        .unwrap();
        assert_eq!(code(cli::run(simulate)), code(ExitCode::SUCCESS));
    }

    #[test]
    fn analyze_reads_config_file() {
        let ini = write_temp_ini(VALID_INI);
        let cli = Cli::try_parse_from([
            "signal-risk",
            "analyze",
            "--config",
            ini.path().to_str().unwrap(),
            "--asset",
            "acme",
            "--entry",
            "20",
            "--atr",
            "1.5",
            "--sector",
            "Materials",
        ])
        .unwrap();
        assert_eq!(code(cli::run(cli)), code(ExitCode::SUCCESS));
    }

    #[test]
    fn neutral_stop_is_rejected() {
        let cli = Cli::try_parse_from([
            "signal-risk", "stop", "--entry", "100", "--current", "105", "--atr", "2",
            "--direction", "neutral",
        ])
        .unwrap();
        assert_eq!(code(cli::run(cli)), code(ExitCode::from(4)));
    }

    #[test]
    fn correlation_from_returns_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("returns.csv");
        fs::write(&file, "A,B,C\n0.01,0.02,-0.01\n0.02,0.01,0.00\n-0.01,0.00,0.02\n").unwrap();
        let cli = Cli::try_parse_from([
            "signal-risk",
            "correlation",
            "--returns",
            file.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(code(cli::run(cli)), code(ExitCode::SUCCESS));
    }
}
