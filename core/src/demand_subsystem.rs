//! Daily order requests.
//!
//! Three sources, generated in this order every day:
//!   1. Repeat orders from existing users (tier- and state-dependent hazard)
//!   2. Yesterday's referrals, arriving as referral-channel users
//!   3. Paid acquisition through the exposure → click → consult → order
//!      funnel, with the conversion step reduced by yesterday's complaint
//!      penalty
//!
//! Repeat and paid demand are both scaled by today's policy demand
//! factor; referrals are not. Every new user places a first order on the
//! day they arrive.

use crate::{
    clock::{is_month_end, is_weekend},
    config::{AgeTierConfig, CacTable, DemandConfig, LifecycleConfig, SimConfig, TimeOfDayMultipliers},
    complaint_subsystem::adjusted_conversion,
    error::SimResult,
    event::SimEvent,
    geo::{pick_district, District},
    lifecycle_subsystem::{state_for_recency, LifecycleState, User},
    market::Market,
    order::Order,
    referral_subsystem::ReferralArrival,
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    supply_subsystem::{SupplyPool, TrainingTier},
    types::{AgeTier, Channel, ChannelTally, Day, EscortId, OrderId, TimeSlot, UserId},
};
use serde::{Deserialize, Serialize};
use std::any::Any;

const SEEDED_DESIGNATION_RATE: f64 = 0.2;
const SEEDED_MAX_RECENCY_DAYS: u64 = 120;
const SEEDED_MAX_PRIOR_ORDERS: u64 = 4;
const SEEDED_MAX_TENURE_DAYS: u64 = 180;

/// Values computed at the end of the previous day.
#[derive(Debug, Clone, Default)]
pub struct FeedbackInputs {
    pub conversion_reduction: f64,
    pub referrals:            Vec<ReferralArrival>,
}

#[derive(Debug, Clone, Default)]
pub struct DemandBatch {
    pub orders:         Vec<Order>,
    pub new_users:      u32,
    pub referred_users: u32,
    pub repeat_orders:  u32,
    pub spend:          f64,
}

pub struct DemandGenerator {
    demand:                 DemandConfig,
    tiers:                  AgeTierConfig,
    time_of_day:            TimeOfDayMultipliers,
    cac:                    CacTable,
    designated_repeat_rate: f64,
    market_scale:           f64,
    next_order_id:          u64,
    pub acquisitions:       ChannelTally<u32>,
    pub acquisition_spend:  ChannelTally<f64>,
}

impl DemandGenerator {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            demand:                 config.demand.clone(),
            tiers:                  config.age_tiers.clone(),
            time_of_day:            config.time_of_day.clone(),
            cac:                    config.cac.clone(),
            designated_repeat_rate: config.matching.designated_repeat_rate,
            market_scale:           config.market_scale,
            next_order_id:          1,
            acquisitions:           ChannelTally::default(),
            acquisition_spend:      ChannelTally::default(),
        }
    }

    pub fn acquisition_summary(&self) -> AcquisitionSummary {
        AcquisitionSummary { users: self.acquisitions, spend: self.acquisition_spend }
    }

    /// Weekend and month-end demand factor.
    pub fn day_factor(&self, day: Day) -> f64 {
        let mut factor = 1.0;
        if is_weekend(day) {
            factor *= self.demand.weekend_factor;
        }
        if is_month_end(day) {
            factor *= self.demand.month_end_factor;
        }
        factor
    }

    /// Expected paid prospects before volatility.
    pub fn expected_prospects(&self, day: Day, conversion_reduction: f64) -> f64 {
        let d = &self.demand;
        d.dau_base
            * self.market_scale
            * d.exposure_rate
            * d.click_rate
            * d.consult_rate
            * adjusted_conversion(d.order_conversion_rate, conversion_reduction)
            * self.day_factor(day)
            * self.time_of_day.mean()
    }

    /// Daily probability that an existing user places another order.
    pub fn repeat_probability(&self, user: &User) -> f64 {
        if user.order_count == 0 || user.days_since_last_order < self.demand.min_repeat_gap_days {
            return 0.0;
        }
        let state_factor = match user.state {
            LifecycleState::Active  => 1.0,
            LifecycleState::AtRisk  => 0.6,
            LifecycleState::Silent  => 0.3,
            LifecycleState::Churned => 0.0,
        };
        let base = if user.designated_escort.is_some() {
            self.designated_repeat_rate
        } else if user.order_count == 1 {
            self.demand.first_order_repeat_rate
        } else if user.proxy_purchase {
            self.demand.proxy_repeat_rate
        } else {
            self.demand.self_repeat_rate
        };
        let tier = self.tiers.get(user.age_tier);
        (base / tier.repurchase_cycle_days * tier.order_propensity * state_factor).clamp(0.0, 1.0)
    }

    /// Pre-launch users with order history, some already attached to a
    /// same-district escort.
    pub fn seed_population(
        &mut self,
        count: u32,
        users: &mut Vec<User>,
        pool: &mut SupplyPool,
        lifecycle: &LifecycleConfig,
        history_depth: usize,
        rng: &mut SubsystemRng,
    ) {
        for _ in 0..count {
            let tier = self.pick_tier(rng);
            let district = pick_district(rng, self.demand.urban_share);
            let channel = self.pick_paid_channel(rng);
            let id = UserId(users.len() as u32);
            let mut user = User::new(id, tier, rng.chance(self.tiers.get(tier).proxy_usage_rate), district, channel, 0);
            let recency = rng.next_u64_below(SEEDED_MAX_RECENCY_DAYS + 1) as u32;
            user.days_since_last_order = recency;
            user.days_since_signup = recency + rng.next_u64_below(SEEDED_MAX_TENURE_DAYS) as u32;
            user.order_count = 1 + rng.next_u64_below(SEEDED_MAX_PRIOR_ORDERS) as u32;
            user.repeated = user.order_count >= 2;
            user.state = state_for_recency(recency, lifecycle);

            if user.repeated && rng.chance(SEEDED_DESIGNATION_RATE) {
                let local: Vec<EscortId> = pool
                    .iter()
                    .filter(|e| e.active && e.tier != TrainingTier::Trainee && e.home_district == district)
                    .map(|e| e.id)
                    .collect();
                if !local.is_empty() {
                    let escort_id = local[rng.next_u64_below(local.len() as u64) as usize];
                    user.designated_escort = Some(escort_id);
                    user.remember_escort(escort_id, 0, history_depth);
                    if let Some(escort) = pool.get_mut(escort_id) {
                        escort.designated_clients.insert(id);
                    }
                }
            }
            users.push(user);
        }
        log::debug!("day=0 demand: seeded {count} users");
    }

    /// Generate the day's pending orders, adding newly acquired users to
    /// `users`.
    pub fn generate(
        &mut self,
        day: Day,
        users: &mut Vec<User>,
        inputs: &FeedbackInputs,
        demand_factor: f64,
        rng: &mut SubsystemRng,
    ) -> (DemandBatch, Vec<SimEvent>) {
        let mut batch = DemandBatch::default();
        let mut events = Vec::new();

        for user in users.iter() {
            let p = (self.repeat_probability(user) * demand_factor).min(1.0);
            if p > 0.0 && rng.chance(p) {
                let order = self.place_order(day, user, rng);
                batch.orders.push(order);
                batch.repeat_orders += 1;
            }
        }

        for arrival in &inputs.referrals {
            let tier = self.pick_tier(rng);
            let user_id = self.acquire(day, users, tier, arrival.district, Channel::Referral, &mut batch, rng);
            events.push(SimEvent::ReferralAcquired { day, user_id, referrer: arrival.referrer });
            batch.referred_users += 1;
        }

        let expected = self.expected_prospects(day, inputs.conversion_reduction) * demand_factor;
        let shock = (1.0 + rng.normal(0.0, self.demand.demand_volatility)).max(0.0);
        let prospects = rng.stochastic_round(expected * shock);
        for _ in 0..prospects {
            let tier = self.pick_tier(rng);
            if !rng.chance(self.tiers.get(tier).order_propensity) {
                continue;
            }
            let district = pick_district(rng, self.demand.urban_share);
            let channel = self.pick_paid_channel(rng);
            self.acquire(day, users, tier, district, channel, &mut batch, rng);
        }

        log::debug!(
            "day={day} demand: prospects={prospects} new={} referred={} repeat={} orders={} reduction={:.4}",
            batch.new_users, batch.referred_users, batch.repeat_orders, batch.orders.len(),
            inputs.conversion_reduction
        );
        (batch, events)
    }

    #[allow(clippy::too_many_arguments)]
    fn acquire(
        &mut self,
        day: Day,
        users: &mut Vec<User>,
        tier: AgeTier,
        district: District,
        channel: Channel,
        batch: &mut DemandBatch,
        rng: &mut SubsystemRng,
    ) -> UserId {
        let id = UserId(users.len() as u32);
        let proxy = rng.chance(self.tiers.get(tier).proxy_usage_rate);
        let user = User::new(id, tier, proxy, district, channel, day);
        let order = self.place_order(day, &user, rng);
        users.push(user);

        let cost = self.cac.get(channel);
        self.acquisitions.add(channel, 1);
        self.acquisition_spend.add(channel, cost);
        batch.spend += cost;
        batch.new_users += 1;
        batch.orders.push(order);
        id
    }

    fn place_order(&mut self, day: Day, user: &User, rng: &mut SubsystemRng) -> Order {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        let slot = TimeSlot::ALL[rng.pick_weighted(&self.time_of_day.weights())];
        let price = rng.normal(self.demand.price_mean, self.demand.price_std).max(self.demand.price_floor);
        Order::new(id, user.id, day, user.district, slot, price)
            .with_designated(user.designated_escort)
            .with_repeat(user.order_count > 0)
    }

    fn pick_tier(&self, rng: &mut SubsystemRng) -> AgeTier {
        AgeTier::ALL[rng.pick_weighted(&self.tiers.shares())]
    }

    fn pick_paid_channel(&self, rng: &mut SubsystemRng) -> Channel {
        Channel::PAID[rng.pick_weighted(&self.demand.channel_mix.weights())]
    }
}

impl SimSubsystem for DemandGenerator {
    fn name(&self) -> &'static str {
        "demand"
    }

    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        _events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let today = &mut market.today;
        let (batch, events) =
            self.generate(day, &mut market.users, &today.inputs, today.conditions.demand_factor, rng);
        today.pending = batch.orders;
        today.new_users = batch.new_users;
        today.referred_users = batch.referred_users;
        today.spend = batch.spend;
        Ok(events)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Acquisition totals exposed on trial summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub users: ChannelTally<u32>,
    pub spend: ChannelTally<f64>,
}
