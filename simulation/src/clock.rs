//! Simulation clock
//!
//! A day counter from the start date. Advancing reports which period
//! boundaries the new day crossed.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    pub start: NaiveDate,
    /// Days elapsed since `start`.
    pub days: u32,
}

/// Period triggers fired by one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boundaries {
    pub new_month: bool,
    pub new_quarter: bool,
    pub new_year: bool,
}

impl Clock {
    pub fn new(start: NaiveDate) -> Self {
        Self { start, days: 0 }
    }

    pub fn today(&self) -> NaiveDate {
        self.start + Duration::days(i64::from(self.days))
    }

    pub fn year(&self) -> i32 {
        self.today().year()
    }

    /// Calendar month, 1-12.
    pub fn month(&self) -> u8 {
        self.today().month() as u8
    }

    pub fn advance(&mut self) -> Boundaries {
        let before = self.today();
        self.days += 1;
        let today = self.today();
        let new_month = today.month() != before.month() || today.year() != before.year();
        Boundaries {
            new_month,
            new_quarter: new_month && (today.month() - 1) % 3 == 0,
            new_year: today.year() != before.year(),
        }
    }
}
