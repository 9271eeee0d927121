//! Clock backed by the local system time.

use crate::ports::clock_port::Clock;
use chrono::{Local, NaiveDate};

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
