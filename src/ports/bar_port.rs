//! Historical bar access port.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

/// Supplies daily bars for a ticker, ordered by date ascending.
///
/// An unknown ticker is not an error: implementations return an empty vector.
/// `Err` is reserved for a broken data source (unreadable file, bad rows).
pub trait BarProvider {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, EngineError>;
}
