//! Shared state of one trial.
//!
//! The engine owns a single `Market` and lends it to every subsystem in
//! turn. Long-lived state (users, the escort roster, the order log)
//! persists across days. The `DayLedger` is rebuilt every tick and is how
//! one stage hands its output to the next.

use crate::{
    demand_subsystem::FeedbackInputs,
    lifecycle_subsystem::{LifecycleCounts, User},
    order::Order,
    referral_subsystem::NpsSummary,
    supply_subsystem::{SupplyChange, SupplyPool},
};

/// Totals of the outcome-recording stages for one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayOutcome {
    pub orders:       u32,
    pub matched:      u32,
    pub cancelled:    u32,
    pub completed:    u32,
    pub complaints:   u32,
    /// Value of completed orders.
    pub gmv:          f64,
    /// Refunds paid on today's complaints.
    pub compensation: f64,
}

impl DayOutcome {
    pub fn net_gmv(&self) -> f64 {
        self.gmv - self.compensation
    }
}

/// Demand multipliers set by the market-conditions stage for today.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    pub demand_factor:      f64,
    pub recruitment_factor: f64,
}

impl Default for Conditions {
    fn default() -> Self {
        Self { demand_factor: 1.0, recruitment_factor: 1.0 }
    }
}

/// Hand-offs between stages within a single day.
#[derive(Debug, Clone, Default)]
pub struct DayLedger {
    pub conditions:     Conditions,
    /// Yesterday's complaint penalty and referrals, read by demand.
    pub inputs:         FeedbackInputs,
    /// Demand output, consumed by matching.
    pub pending:        Vec<Order>,
    /// Matching output, consumed by the complaint stage.
    pub resolved:       Vec<Order>,
    pub new_users:      u32,
    pub referred_users: u32,
    pub spend:          f64,
    pub outcome:        DayOutcome,
    /// Rolling-window complaint rate after today.
    pub complaint_rate: f64,
    pub nps:            NpsSummary,
    pub lifecycle:      LifecycleCounts,
    pub supply:         SupplyChange,
    /// Written by the complaint and referral stages; becomes tomorrow's
    /// `inputs`.
    pub next_inputs:    FeedbackInputs,
}

pub struct Market {
    pub users:     Vec<User>,
    pub supply:    SupplyPool,
    pub order_log: Vec<Order>,
    pub today:     DayLedger,
}

impl Market {
    pub fn new(users: Vec<User>, supply: SupplyPool) -> Self {
        Self { users, supply, order_log: Vec::new(), today: DayLedger::default() }
    }

    /// Close out yesterday and open a fresh ledger for today. Only the
    /// feedback published yesterday carries over.
    pub fn begin_day(&mut self) {
        let inputs = std::mem::take(&mut self.today.next_inputs);
        self.today = DayLedger { inputs, ..DayLedger::default() };
        self.supply.begin_day();
    }
}
