//! CSV file data adapter.
//!
//! Bars live in `<base_path>/<TICKER>.csv` with the header
//! `date,open,high,low,close,volume`. Signal batches are a single CSV with
//! the header `asset,entry_date,direction,entry_price,stop_loss,take_profit,time_horizon`.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::signal::SignalRecord;
use crate::ports::bar_port::BarProvider;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker.to_uppercase()))
    }
}

#[derive(Debug, Deserialize)]
struct BarRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl BarProvider for CsvAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, EngineError> {
        let path = self.csv_path(ticker);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no bar file for {} at {}", ticker, path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(EngineError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                })
            }
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (line, result) in rdr.deserialize::<BarRow>().enumerate() {
            let row = result.map_err(|e| EngineError::DataSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                EngineError::DataSource {
                    reason: format!(
                        "{}: invalid date '{}' on data row {}: {}",
                        path.display(),
                        row.date,
                        line + 1,
                        e
                    ),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let bar = PriceBar {
                ticker: ticker.to_uppercase(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            };
            if !bar.is_well_formed() {
                return Err(EngineError::DataSource {
                    reason: format!(
                        "{}: out-of-range prices on data row {} ({})",
                        path.display(),
                        line + 1,
                        row.date
                    ),
                });
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

/// One CSV row of a signal batch. Cells are kept as text so a bad value
/// rejects only that record, later, in [`SignalRecord::resolve`].
#[derive(Debug, Deserialize)]
struct SignalRow {
    asset: Option<String>,
    entry_date: Option<String>,
    direction: Option<String>,
    entry_price: Option<String>,
    stop_loss: Option<String>,
    take_profit: Option<String>,
    time_horizon: Option<String>,
}

impl SignalRow {
    fn into_record(self) -> SignalRecord {
        fn number<T: std::str::FromStr>(cell: Option<String>) -> Option<T> {
            cell.and_then(|c| c.trim().parse().ok())
        }

        SignalRecord {
            asset: self.asset.filter(|a| !a.trim().is_empty()),
            entry_date: self
                .entry_date
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
            direction: self.direction.filter(|d| !d.trim().is_empty()),
            entry_price: number(self.entry_price),
            stop_loss: number(self.stop_loss),
            take_profit: number(self.take_profit),
            time_horizon: number(self.time_horizon),
        }
    }
}

/// Read a batch of backtest signals. Only structural CSV errors fail the
/// whole load.
pub fn load_signal_records(path: &Path) -> Result<Vec<SignalRecord>, EngineError> {
    let content = fs::read_to_string(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    rdr.deserialize::<SignalRow>()
        .map(|row| {
            row.map(SignalRow::into_record)
                .map_err(|e| EngineError::DataSource {
                    reason: format!("{}: CSV parse error: {}", path.display(), e),
                })
        })
        .collect()
}

/// Read a time-major return matrix: header row of asset names, one row of
/// returns per period.
pub fn load_returns_matrix(path: &Path) -> Result<(Vec<String>, Vec<Vec<f64>>), EngineError> {
    let content = fs::read_to_string(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let assets: Vec<String> = rdr
        .headers()
        .map_err(|e| EngineError::DataSource {
            reason: format!("{}: CSV header error: {}", path.display(), e),
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| EngineError::DataSource {
            reason: format!("{}: CSV parse error: {}", path.display(), e),
        })?;
        let row = record
            .iter()
            .map(|cell| {
                cell.parse::<f64>().map_err(|_| EngineError::DataSource {
                    reason: format!(
                        "{}: invalid return '{}' on data row {}",
                        path.display(),
                        cell,
                        line + 1
                    ),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }
    Ok((assets, rows))
}
