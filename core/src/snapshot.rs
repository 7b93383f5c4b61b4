//! Daily cohort snapshots.
//!
//! One snapshot per simulated day, appended at the end of the tick.
//! Snapshots aggregate counts only; they hold no references to users,
//! escorts or orders.

use crate::types::Day;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSnapshot {
    pub day:                Day,
    // Cohort
    pub total_users:        u32,
    pub active:             u32,
    pub at_risk:            u32,
    pub silent:             u32,
    pub churned:            u32,
    pub repeat_order_rate:  f64,
    pub nps:                f64,
    // Orders
    pub orders:             u32,
    pub matched:            u32,
    pub cancelled:          u32,
    pub completed:          u32,
    pub match_success_rate: f64,
    pub complaint_rate:     f64,
    // Acquisition
    pub new_users:          u32,
    pub referred_users:     u32,
    pub acquisition_spend:  f64,
    // Money, net of complaint refunds
    pub gmv:                f64,
    pub compensation:       f64,
    pub cumulative_gmv:     f64,
    // Supply
    pub servable_escorts:   u32,
    pub recruited:          u32,
    pub promoted:           u32,
    pub failed_training:    u32,
    pub departed:           u32,
    /// Policy multiplier on today's demand.
    pub demand_factor:      f64,
}

impl CohortSnapshot {
    pub fn churned_fraction(&self) -> f64 {
        if self.total_users == 0 {
            return 0.0;
        }
        self.churned as f64 / self.total_users as f64
    }
}

/// matched / (orders − cancelled); zero on a day without matchable orders.
pub fn match_success_rate(orders: u32, cancelled: u32, matched: u32) -> f64 {
    let attempted = orders.saturating_sub(cancelled);
    if attempted == 0 {
        return 0.0;
    }
    matched as f64 / attempted as f64
}
