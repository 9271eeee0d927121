//! Wall-clock port, so "today" can be pinned in tests.

use chrono::NaiveDate;

pub trait Clock {
    fn today(&self) -> NaiveDate;
}
