//! The simulation engine: one Monte Carlo trial, one day per tick.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   0. Start of day:  clear escort calendars, open today's ledger with
//!                     yesterday's feedback
//!   1. Conditions     (policy events, poaching attrition, demand and
//!                      recruitment factors)
//!   2. Demand         (repeat orders, yesterday's referrals, paid funnel)
//!   3. Matching       (cancellation, three-tier match, service outcome,
//!                      user and escort updates)
//!   4. Complaints     (typed complaints and refunds, rolling window,
//!                      tomorrow's conversion penalty)
//!   5. Referrals      (NPS classification, tomorrow's referred users)
//!   6. Lifecycle      (state transitions, weekly reactivation)
//!   7. Supply         (recruitment, training gates, attrition)
//!   8. End of day:    append the snapshot
//!
//! RULES:
//!   - Subsystems execute in registration order, every tick.
//!   - Later stages read state mutated by earlier stages of the same tick.
//!   - The complaint penalty and referrals computed in stages 4-5 are read
//!     by demand on the NEXT tick only.
//!   - No subsystem calls another subsystem's functions directly; they
//!     hand over work through the market's day ledger.
//!   - All randomness flows through the RngBank, one stream per stage per day.
//!   - Users are never deleted. Escorts are only deleted when they fail
//!     basic training.

use crate::{
    clock::SimClock,
    complaint_subsystem::ComplaintFeedback,
    conditions_subsystem::MarketConditions,
    config::SimConfig,
    demand_subsystem::{AcquisitionSummary, DemandGenerator},
    error::{SimError, SimResult},
    event::{EventLogEntry, SimEvent},
    lifecycle_subsystem::{LifecycleTracker, User},
    market::{DayOutcome, Market},
    matching_subsystem::{MatchStats, MatchingSubsystem},
    order::Order,
    referral_subsystem::ReferralEngine,
    rng::{RngBank, SubsystemSlot},
    snapshot::{match_success_rate, CohortSnapshot},
    subsystem::SimSubsystem,
    supply_subsystem::{SupplyDynamics, SupplyPool},
    types::Day,
};

pub struct SimEngine {
    pub trial:        u32,
    pub clock:        SimClock,
    rng_bank:         RngBank,
    config:           SimConfig,
    subsystems:       Vec<(SubsystemSlot, Box<dyn SimSubsystem>)>,
    market:           Market,
    snapshots:        Vec<CohortSnapshot>,
    event_log:        Vec<EventLogEntry>,
    cumulative_gmv:   f64,
    cumulative_spend: f64,
}

impl SimEngine {
    /// Validate the configuration, seed the pre-launch roster and users,
    /// and register every subsystem in execution order.
    pub fn new(config: SimConfig, trial: u32, seed: u64) -> SimResult<Self> {
        config.validate()?;

        let rng_bank = RngBank::new(seed);
        let mut supply = SupplyPool::new(config.supply.clone());
        let mut demand = DemandGenerator::new(&config);
        let mut users = Vec::new();

        let mut rng = rng_bank.for_day(SubsystemSlot::Population, 0);
        supply.seed_initial(&mut rng);
        demand.seed_population(
            config.initial_users,
            &mut users,
            &mut supply,
            &config.lifecycle,
            config.matching.history_depth,
            &mut rng,
        );

        let mut engine = Self {
            trial,
            clock:            SimClock::new(config.days()),
            rng_bank,
            subsystems:       Vec::new(),
            market:           Market::new(users, supply),
            snapshots:        Vec::new(),
            event_log:        Vec::new(),
            cumulative_gmv:   0.0,
            cumulative_spend: 0.0,
            config,
        };

        // EXECUTION ORDER: fixed, documented, never reordered.
        let config = engine.config.clone();
        engine.register(SubsystemSlot::Conditions, Box::new(MarketConditions::new(&config)));
        engine.register(SubsystemSlot::Demand, Box::new(demand));
        engine.register(SubsystemSlot::Service, Box::new(MatchingSubsystem::new(&config)));
        engine.register(
            SubsystemSlot::Complaint,
            Box::new(ComplaintFeedback::new(config.complaint.clone()).with_service(config.service.clone())),
        );
        engine.register(SubsystemSlot::Referral, Box::new(ReferralEngine::new(config.referral.clone())));
        engine.register(SubsystemSlot::Lifecycle, Box::new(LifecycleTracker::new(config.lifecycle.clone())));
        engine.register(SubsystemSlot::Supply, Box::new(SupplyDynamics));
        Ok(engine)
    }

    /// Register a subsystem. Call in the documented execution order.
    pub fn register(&mut self, slot: SubsystemSlot, subsystem: Box<dyn SimSubsystem>) {
        self.subsystems.push((slot, subsystem));
    }

    /// Registered subsystems as (slot, name), in execution order.
    pub fn registered(&self) -> Vec<(SubsystemSlot, &'static str)> {
        self.subsystems.iter().map(|(slot, sub)| (*slot, sub.name())).collect()
    }

    /// The first registered subsystem of type `T`.
    /// Used by trial summaries and tests.
    pub fn subsystem<T: 'static>(&self) -> Option<&T> {
        self.subsystems.iter().find_map(|(_, sub)| sub.as_any().downcast_ref::<T>())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.rng_bank.seed()
    }

    pub fn users(&self) -> &[User] {
        &self.market.users
    }

    pub fn supply(&self) -> &SupplyPool {
        &self.market.supply
    }

    pub fn supply_mut(&mut self) -> &mut SupplyPool {
        &mut self.market.supply
    }

    pub fn snapshots(&self) -> &[CohortSnapshot] {
        &self.snapshots
    }

    pub fn order_log(&self) -> &[Order] {
        &self.market.order_log
    }

    pub fn event_log(&self) -> &[EventLogEntry] {
        &self.event_log
    }

    /// GMV to date, net of complaint refunds.
    pub fn cumulative_gmv(&self) -> f64 {
        self.cumulative_gmv
    }

    pub fn match_stats(&self) -> MatchStats {
        self.subsystem::<MatchingSubsystem>()
            .map(|m| m.engine.stats.clone())
            .unwrap_or_default()
    }

    pub fn acquisition_summary(&self) -> AcquisitionSummary {
        self.subsystem::<DemandGenerator>()
            .map(DemandGenerator::acquisition_summary)
            .unwrap_or_default()
    }

    /// Hand over the accumulated logs once the trial is done.
    pub fn into_logs(self) -> (Vec<CohortSnapshot>, Vec<Order>, Vec<EventLogEntry>) {
        (self.snapshots, self.market.order_log, self.event_log)
    }

    /// Advance one day. This is the core simulation step.
    ///
    /// Past the configured horizon this is an error and nothing changes.
    pub fn tick(&mut self) -> SimResult<CohortSnapshot> {
        if self.clock.is_finished() {
            return Err(SimError::HorizonReached { total_days: self.clock.total_days });
        }
        let day = self.clock.advance();
        self.market.begin_day();

        self.run_subsystems(day, |_| true)?;

        let snapshot = self.close_day(day);
        log::debug!(
            "day={day} engine: orders={} matched={} completed={} gmv={:.0} escorts={} active_users={}",
            snapshot.orders, snapshot.matched, snapshot.completed, snapshot.gmv,
            snapshot.servable_escorts, snapshot.active
        );
        self.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    /// Run n days in a loop, stopping early at the configured horizon.
    pub fn run_days(&mut self, n: u64) -> SimResult<()> {
        for _ in 0..n {
            if self.clock.is_finished() {
                break;
            }
            self.tick()?;
        }
        Ok(())
    }

    pub fn run_to_end(&mut self) -> SimResult<()> {
        self.run_days(self.clock.remaining())
    }

    /// Settle a batch of orders through the matching and complaint stages
    /// alone, outside the daily loop. Resolved orders go to the order log.
    ///
    /// An order for a user that does not exist is an error.
    pub fn process_orders(&mut self, day: Day, orders: Vec<Order>) -> SimResult<DayOutcome> {
        self.market.today.pending = orders;
        self.market.today.outcome = DayOutcome::default();
        self.run_subsystems(day, |slot| matches!(slot, SubsystemSlot::Service | SubsystemSlot::Complaint))?;
        Ok(self.market.today.outcome.clone())
    }

    /// Execute each selected subsystem in registration order.
    /// Each subsystem sees all events emitted so far this day.
    fn run_subsystems(&mut self, day: Day, selected: impl Fn(SubsystemSlot) -> bool) -> SimResult<()> {
        let mut day_events: Vec<SimEvent> = Vec::new();
        for (slot, subsystem) in self.subsystems.iter_mut().filter(|(slot, _)| selected(*slot)) {
            let mut rng = self.rng_bank.for_day(*slot, day);
            let new_events = subsystem.update(day, &mut self.market, &day_events, &mut rng)?;

            let name = subsystem.name();
            self.event_log.extend(new_events.iter().map(|event| EventLogEntry {
                day,
                subsystem: name,
                event: event.clone(),
            }));
            day_events.extend(new_events);
        }
        Ok(())
    }

    fn close_day(&mut self, day: Day) -> CohortSnapshot {
        let today = &self.market.today;
        let outcome = &today.outcome;
        self.cumulative_gmv += outcome.net_gmv();
        self.cumulative_spend += today.spend;

        CohortSnapshot {
            day,
            total_users:        self.market.users.len() as u32,
            active:             today.lifecycle.active,
            at_risk:            today.lifecycle.at_risk,
            silent:             today.lifecycle.silent,
            churned:            today.lifecycle.churned,
            repeat_order_rate:  today.lifecycle.repeat_order_rate,
            nps:                today.nps.composite(),
            orders:             outcome.orders,
            matched:            outcome.matched,
            cancelled:          outcome.cancelled,
            completed:          outcome.completed,
            match_success_rate: match_success_rate(outcome.orders, outcome.cancelled, outcome.matched),
            complaint_rate:     today.complaint_rate,
            new_users:          today.new_users,
            referred_users:     today.referred_users,
            acquisition_spend:  self.cumulative_spend,
            gmv:                outcome.net_gmv(),
            compensation:       outcome.compensation,
            cumulative_gmv:     self.cumulative_gmv,
            servable_escorts:   self.market.supply.servable_count() as u32,
            recruited:          today.supply.recruited,
            promoted:           today.supply.promoted,
            failed_training:    today.supply.failed_training,
            departed:           today.supply.departed,
            demand_factor:      today.conditions.demand_factor,
        }
    }
}
