//! Escort roster: recruitment, training pipeline and attrition.
//!
//! Daily, after the day's orders are settled:
//!   1. Week start: recruit trainees at the decayed weekly rate, scaled
//!      by today's policy recruitment factor
//!   2. Training gates for trainees and basic escorts
//!   3. Attrition at the current rate (background + competitor poaching)
//!
//! Calendars are cleared by `begin_day` before matching.

use crate::{
    clock::{is_week_start, week_of},
    config::SupplyConfig,
    error::SimResult,
    event::SimEvent,
    geo::{pick_district, District},
    market::Market,
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    types::{Day, EscortId, TimeWindow, UserId},
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingTier {
    Trainee,
    Basic,
    Certified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escort {
    pub id:                EscortId,
    pub home_district:     District,
    pub tier:              TrainingTier,
    pub joined_day:        Day,
    pub tier_since:        Day,
    /// Basic escorts get one shot at certification.
    pub certification_attempted: bool,
    /// Windows committed for the current day.
    pub calendar:          Vec<TimeWindow>,
    pub designated_clients: BTreeSet<UserId>,
    pub completed_orders:  u32,
    pub active:            bool,
}

impl Escort {
    pub fn new(id: EscortId, home_district: District, tier: TrainingTier, day: Day) -> Self {
        Self {
            id,
            home_district,
            tier,
            joined_day: day,
            tier_since: day,
            certification_attempted: false,
            calendar: Vec::new(),
            designated_clients: BTreeSet::new(),
            completed_orders: 0,
            active: true,
        }
    }

    pub fn daily_capacity(&self, config: &SupplyConfig) -> usize {
        match self.tier {
            TrainingTier::Trainee   => 0,
            TrainingTier::Basic     => config.basic_daily_capacity,
            TrainingTier::Certified => config.certified_daily_capacity,
        }
    }

    /// Active, trained, under capacity and free for the whole window.
    pub fn can_take(&self, window: &TimeWindow, config: &SupplyConfig) -> bool {
        self.active
            && self.tier != TrainingTier::Trainee
            && self.calendar.len() < self.daily_capacity(config)
            && !self.calendar.iter().any(|w| w.overlaps(window))
    }

    pub fn commit(&mut self, window: TimeWindow) {
        self.calendar.push(window);
    }
}

/// Weekly recruitment for 1-based `week`: geometric decay from the week-1
/// rate to `floor × week-1 rate` at the horizon week, flat afterwards.
pub fn recruitment_rate(week: u64, week1_rate: f64, floor: f64, horizon_weeks: u64) -> f64 {
    let week = week.max(1);
    if week >= horizon_weeks {
        return week1_rate * floor;
    }
    let progress = (week - 1) as f64 / (horizon_weeks - 1) as f64;
    week1_rate * floor.powf(progress)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyChange {
    pub recruited:        u32,
    pub promoted:         u32,
    pub failed_training:  u32,
    pub departed:         u32,
}

pub struct SupplyPool {
    config:             SupplyConfig,
    escorts:            BTreeMap<EscortId, Escort>,
    next_id:            u32,
    /// Monthly attrition probability; set each day by market conditions.
    attrition_rate:     f64,
    recruitment_factor: f64,
}

impl SupplyPool {
    pub fn new(config: SupplyConfig) -> Self {
        let attrition_rate = config.monthly_attrition;
        Self { config, escorts: BTreeMap::new(), next_id: 1, attrition_rate, recruitment_factor: 1.0 }
    }

    pub fn config(&self) -> &SupplyConfig {
        &self.config
    }

    /// Add an escort to the roster and return its identity.
    pub fn enroll(&mut self, home_district: District, tier: TrainingTier, day: Day) -> EscortId {
        let id = EscortId(self.next_id);
        self.next_id += 1;
        self.escorts.insert(id, Escort::new(id, home_district, tier, day));
        id
    }

    /// Pre-launch roster: trained escorts, some already certified.
    pub fn seed_initial(&mut self, rng: &mut SubsystemRng) {
        for _ in 0..self.config.initial_escorts {
            let district = pick_district(rng, self.config.urban_share);
            let tier = if rng.chance(self.config.initial_certified_share) {
                TrainingTier::Certified
            } else {
                TrainingTier::Basic
            };
            self.enroll(district, tier, 0);
        }
        log::debug!("day=0 supply: seeded {} escorts", self.escorts.len());
    }

    pub fn get(&self, id: EscortId) -> Option<&Escort> {
        self.escorts.get(&id)
    }

    pub fn get_mut(&mut self, id: EscortId) -> Option<&mut Escort> {
        self.escorts.get_mut(&id)
    }

    /// All escorts ever enrolled and not removed, in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Escort> {
        self.escorts.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Escort> {
        self.escorts.values_mut()
    }

    pub fn len(&self) -> usize {
        self.escorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escorts.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.escorts.values().filter(|e| e.active).count()
    }

    /// Active escorts that have passed basic training.
    pub fn servable_count(&self) -> usize {
        self.escorts.values().filter(|e| e.active && e.tier != TrainingTier::Trainee).count()
    }

    pub fn attrition_rate(&self) -> f64 {
        self.attrition_rate
    }

    /// Competition input: monthly attrition probability from today on.
    pub fn set_attrition_rate(&mut self, monthly: f64) {
        self.attrition_rate = monthly.clamp(0.0, 1.0);
    }

    pub fn recruitment_factor(&self) -> f64 {
        self.recruitment_factor
    }

    /// Policy input: multiplier on the weekly recruitment rate.
    pub fn set_recruitment_factor(&mut self, factor: f64) {
        self.recruitment_factor = factor.max(0.0);
    }

    /// Clear every committed window; a new day starts.
    pub fn begin_day(&mut self) {
        for escort in self.escorts.values_mut() {
            escort.calendar.clear();
        }
    }

    /// Recruitment, training gates and attrition for `day`.
    pub fn evolve(&mut self, day: Day, rng: &mut SubsystemRng) -> (SupplyChange, Vec<SimEvent>) {
        let mut change = SupplyChange::default();
        let mut events = Vec::new();

        if is_week_start(day) {
            let week = week_of(day);
            let rate = recruitment_rate(
                week,
                self.config.week1_recruitment,
                self.config.recruitment_floor,
                self.config.recruitment_horizon_weeks,
            ) * self.recruitment_factor;
            let count = rng.stochastic_round(rate);
            for _ in 0..count {
                let district = pick_district(rng, self.config.urban_share);
                let escort_id = self.enroll(district, TrainingTier::Trainee, day);
                events.push(SimEvent::EscortRecruited { day, escort_id, district });
            }
            change.recruited = count as u32;
            log::debug!("day={day} supply: week={week} rate={rate:.2} recruited={count}");
        }

        let mut removed = Vec::new();
        for escort in self.escorts.values_mut().filter(|e| e.active) {
            let days_in_tier = day.saturating_sub(escort.tier_since);
            match escort.tier {
                TrainingTier::Trainee if days_in_tier >= self.config.basic_training_days => {
                    if rng.chance(self.config.training_pass_rate) {
                        escort.tier = TrainingTier::Basic;
                        escort.tier_since = day;
                        change.promoted += 1;
                        events.push(SimEvent::EscortPromoted { day, escort_id: escort.id, tier: TrainingTier::Basic });
                    } else {
                        removed.push(escort.id);
                    }
                }
                TrainingTier::Basic
                    if !escort.certification_attempted
                        && days_in_tier >= self.config.professional_training_days =>
                {
                    escort.certification_attempted = true;
                    if rng.chance(self.config.training_pass_rate) {
                        escort.tier = TrainingTier::Certified;
                        escort.tier_since = day;
                        change.promoted += 1;
                        events.push(SimEvent::EscortPromoted { day, escort_id: escort.id, tier: TrainingTier::Certified });
                    }
                }
                _ => {}
            }
        }
        for escort_id in removed {
            self.escorts.remove(&escort_id);
            change.failed_training += 1;
            events.push(SimEvent::EscortFailedTraining { day, escort_id });
        }

        let daily_attrition = self.attrition_rate / 30.0;
        for escort in self.escorts.values_mut().filter(|e| e.active) {
            if rng.chance(daily_attrition) {
                escort.active = false;
                change.departed += 1;
                events.push(SimEvent::EscortDeparted { day, escort_id: escort.id });
            }
        }

        if change.promoted + change.failed_training + change.departed > 0 {
            log::debug!(
                "day={day} supply: promoted={} failed={} departed={} attrition={:.3}",
                change.promoted, change.failed_training, change.departed, self.attrition_rate
            );
        }
        (change, events)
    }
}

/// The supply stage: runs `SupplyPool::evolve` on the market's roster.
#[derive(Debug, Default)]
pub struct SupplyDynamics;

impl SimSubsystem for SupplyDynamics {
    fn name(&self) -> &'static str {
        "supply"
    }

    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        _events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let (change, events) = market.supply.evolve(day, rng);
        market.today.supply = change;
        Ok(events)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
