#![allow(dead_code)]

use chrono::NaiveDate;
pub use signal_risk::domain::ohlcv::PriceBar;
use signal_risk::domain::error::EngineError;
use signal_risk::domain::signal::SignalRecord;
use signal_risk::ports::bar_port::BarProvider;
use signal_risk::ports::clock_port::Clock;
use std::cell::RefCell;
use std::collections::HashMap;

pub struct MockBarProvider {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub requests: RefCell<Vec<String>>,
}

impl MockBarProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn request_count(&self, ticker: &str) -> usize {
        self.requests.borrow().iter().filter(|t| *t == ticker).count()
    }
}

impl BarProvider for MockBarProvider {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, EngineError> {
        self.requests.borrow_mut().push(ticker.to_string());
        if let Some(reason) = self.errors.get(ticker) {
            return Err(EngineError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn make_bar(ticker: &str, day: &str, low: f64, high: f64, close: f64) -> PriceBar {
    PriceBar {
        ticker: ticker.to_string(),
        date: date(day),
        open: close,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

/// Quiet bars that trigger nothing for a 95/110 long around 100.
pub fn flat_bars(ticker: &str, start: &str, count: usize) -> Vec<PriceBar> {
    let first = date(start);
    (0..count)
        .map(|i| PriceBar {
            ticker: ticker.to_string(),
            date: first + chrono::Days::new(i as u64),
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.0,
            volume: 1_000.0,
        })
        .collect()
}

pub fn make_record(
    asset: &str,
    entry_date: &str,
    direction: &str,
    entry: f64,
    stop: f64,
    target: f64,
    horizon: u32,
) -> SignalRecord {
    SignalRecord {
        asset: Some(asset.to_string()),
        entry_date: Some(date(entry_date)),
        direction: Some(direction.to_string()),
        entry_price: Some(entry),
        stop_loss: Some(stop),
        take_profit: Some(target),
        time_horizon: Some(horizon),
    }
}
