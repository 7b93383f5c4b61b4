//! Simulation clock. Owns the day counter and the calendar helpers
//! every component uses to find week and month boundaries.

use crate::types::Day;
use serde::{Deserialize, Serialize};

pub const DAYS_PER_WEEK: Day = 7;
pub const DAYS_PER_MONTH: Day = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_day: Day,
    pub total_days:  Day,
}

impl SimClock {
    pub fn new(total_days: Day) -> Self {
        Self { current_day: 0, total_days }
    }

    /// Advance one day. Returns the new day number.
    pub fn advance(&mut self) -> Day {
        self.current_day += 1;
        self.current_day
    }

    pub fn is_finished(&self) -> bool {
        self.current_day >= self.total_days
    }

    pub fn remaining(&self) -> Day {
        self.total_days.saturating_sub(self.current_day)
    }
}

/// 1-based week number of a 1-based day.
pub fn week_of(day: Day) -> u64 {
    day.saturating_sub(1) / DAYS_PER_WEEK + 1
}

/// True on days 1, 8, 15, ...
pub fn is_week_start(day: Day) -> bool {
    day >= 1 && (day - 1) % DAYS_PER_WEEK == 0
}

/// True on days 7, 14, 21, ...
pub fn is_week_end(day: Day) -> bool {
    day > 0 && day % DAYS_PER_WEEK == 0
}

/// Day 1 is a Monday; the last two days of each week are the weekend.
pub fn is_weekend(day: Day) -> bool {
    day >= 1 && (day - 1) % DAYS_PER_WEEK >= 5
}

/// Last three days of each 30-day month.
pub fn is_month_end(day: Day) -> bool {
    day >= 1 && (day - 1) % DAYS_PER_MONTH >= DAYS_PER_MONTH - 3
}
