//! Daily price bar representation.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// All prices and volume finite and non-negative, with low <= high.
    pub fn is_well_formed(&self) -> bool {
        let values = [self.open, self.high, self.low, self.close, self.volume];
        values.iter().all(|v| v.is_finite() && *v >= 0.0) && self.low <= self.high
    }
}

/// Bars whose date falls in `[start, end]`, preserving order.
pub fn slice_by_date(bars: &[PriceBar], start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
    bars.iter()
        .filter(|b| b.date >= start && b.date <= end)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, low: f64, high: f64) -> PriceBar {
        PriceBar {
            ticker: "BHP".into(),
            date,
            open: low,
            high,
            low,
            close: high,
            volume: 50_000.0,
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn well_formed_bar() {
        assert!(bar(d(1), 90.0, 110.0).is_well_formed());
    }

    #[test]
    fn inverted_range_is_malformed() {
        assert!(!bar(d(1), 110.0, 90.0).is_well_formed());
    }

    #[test]
    fn negative_price_is_malformed() {
        assert!(!bar(d(1), -1.0, 90.0).is_well_formed());
    }

    #[test]
    fn nan_is_malformed() {
        let mut b = bar(d(1), 90.0, 110.0);
        b.close = f64::NAN;
        assert!(!b.is_well_formed());
    }

    #[test]
    fn slice_is_inclusive_on_both_ends() {
        let bars: Vec<_> = (1..=10).map(|day| bar(d(day), 90.0, 110.0)).collect();
        let sliced = slice_by_date(&bars, d(3), d(6));
        assert_eq!(sliced.len(), 4);
        assert_eq!(sliced[0].date, d(3));
        assert_eq!(sliced[3].date, d(6));
    }

    #[test]
    fn slice_outside_range_is_empty() {
        let bars: Vec<_> = (1..=5).map(|day| bar(d(day), 90.0, 110.0)).collect();
        assert!(slice_by_date(&bars, d(20), d(25)).is_empty());
    }
}
