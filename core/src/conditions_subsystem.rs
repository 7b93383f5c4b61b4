//! Market conditions: competitor poaching and policy risk.
//!
//! Execution: first stage of every day, before demand.
//!   1. Policy events whose run is over end
//!   2. Policy events start, on their scheduled day or by the daily draw;
//!      an event already running never starts twice
//!   3. Today's demand and recruitment factors are published on the ledger
//!   4. Escort attrition is set to the background rate plus every
//!      poaching campaign running today
//!
//! Impacts of concurrent policy events add up. Demand is scaled by
//! (1 + impact) but never below `MIN_DEMAND_FACTOR`; recruitment by
//! (1 + impact), floored at zero.

use crate::{
    config::{CompetitionConfig, PolicyConfig, PolicyRiskEvent, SimConfig},
    error::SimResult,
    event::SimEvent,
    market::{Conditions, Market},
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    types::Day,
};
use std::any::Any;

pub const MIN_DEMAND_FACTOR: f64 = 0.1;

pub fn demand_factor(modifier: f64) -> f64 {
    (1.0 + modifier).max(MIN_DEMAND_FACTOR)
}

pub fn recruitment_factor(modifier: f64) -> f64 {
    (1.0 + modifier).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActivePolicy {
    index:     usize,
    /// Last day the event is in force.
    until_day: Day,
}

pub struct MarketConditions {
    competition:    CompetitionConfig,
    policy:         PolicyConfig,
    base_attrition: f64,
    active:         Vec<ActivePolicy>,
}

impl MarketConditions {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            competition:    config.competition.clone(),
            policy:         config.policy.clone(),
            base_attrition: config.supply.monthly_attrition,
            active:         Vec::new(),
        }
    }

    /// Expire finished events and start new ones for `day`.
    pub fn advance(&mut self, day: Day, rng: &mut SubsystemRng) -> Vec<SimEvent> {
        let mut events = Vec::new();

        let policy = &self.policy;
        self.active.retain(|a| {
            let running = day <= a.until_day;
            if !running {
                events.push(SimEvent::PolicyEventEnded { day, name: policy.events[a.index].name.clone() });
            }
            running
        });

        for (index, event) in self.policy.events.iter().enumerate() {
            if self.active.iter().any(|a| a.index == index) {
                continue;
            }
            let scheduled = event.scheduled_day == Some(day);
            let drawn = event.daily_probability > 0.0 && rng.chance(event.daily_probability);
            if !(scheduled || drawn) {
                continue;
            }
            let until_day = day + event.duration_days - 1;
            self.active.push(ActivePolicy { index, until_day });
            log::info!(
                "day={day} conditions: policy event '{}' starts, demand {:+.2} supply {:+.2} until day {until_day}",
                event.name, event.demand_impact, event.supply_impact
            );
            events.push(SimEvent::PolicyEventStarted {
                day,
                name: event.name.clone(),
                demand_impact: event.demand_impact,
                supply_impact: event.supply_impact,
                until_day,
            });
        }
        events
    }

    pub fn active_events(&self) -> impl Iterator<Item = &PolicyRiskEvent> {
        self.active.iter().map(|a| &self.policy.events[a.index])
    }

    /// Sum of the demand impacts in force.
    pub fn demand_modifier(&self) -> f64 {
        self.active_events().map(|e| e.demand_impact).sum()
    }

    /// Sum of the supply impacts in force.
    pub fn supply_modifier(&self) -> f64 {
        self.active_events().map(|e| e.supply_impact).sum()
    }

    /// Monthly attrition for `day`.
    pub fn attrition(&self, day: Day) -> f64 {
        self.base_attrition + self.competition.extra_attrition(day)
    }
}

impl SimSubsystem for MarketConditions {
    fn name(&self) -> &'static str {
        "conditions"
    }

    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        _events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let events = self.advance(day, rng);

        let conditions = Conditions {
            demand_factor:      demand_factor(self.demand_modifier()),
            recruitment_factor: recruitment_factor(self.supply_modifier()),
        };
        market.today.conditions = conditions;
        market.supply.set_recruitment_factor(conditions.recruitment_factor);
        market.supply.set_attrition_rate(self.attrition(day));

        if !self.active.is_empty() {
            log::debug!(
                "day={day} conditions: active={} demand_factor={:.2} recruitment_factor={:.2}",
                self.active.len(), conditions.demand_factor, conditions.recruitment_factor
            );
        }
        Ok(events)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
