//! User retention state machine.
//!
//!   active ──30d──▶ at_risk ──60d──▶ silent ──90d──▶ churned
//!      ▲                                               │
//!      └──── order placed, or weekly 5% reactivation ◀─┘
//!
//! Thresholds are inclusive: exactly 30 days since the last order is
//! at risk. Transitions only move forward; the single way back is to
//! `Active`. Age tier does not enter here; it only shapes how often a
//! user orders (see the demand generator).

use crate::{
    clock::is_week_end,
    config::LifecycleConfig,
    error::SimResult,
    event::SimEvent,
    geo::District,
    market::Market,
    order::MatchTier,
    referral_subsystem::NpsCategory,
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    types::{AgeTier, Channel, Day, EscortId, UserId},
};
use serde::{Deserialize, Serialize};
use std::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    AtRisk,
    Silent,
    Churned,
}

/// A past escort of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscortVisit {
    pub escort: EscortId,
    pub day:    Day,
}

/// What happened on the user's most recent non-cancelled order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub day:    Day,
    pub tier:   MatchTier,
    pub served: bool,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id:                    UserId,
    pub age_tier:              AgeTier,
    /// Orders are placed by family on the senior's behalf.
    pub proxy_purchase:        bool,
    pub district:              District,
    pub channel:               Channel,
    pub acquired_day:          Day,
    pub state:                 LifecycleState,
    pub days_since_last_order: u32,
    pub days_since_signup:     u32,
    pub order_count:           u32,
    /// Has ordered more than once.
    pub repeated:              bool,
    /// Weak reference; resolved against the roster at match time.
    pub designated_escort:     Option<EscortId>,
    /// Most recent first.
    pub escort_history:        Vec<EscortVisit>,
    pub nps:                   Option<NpsCategory>,
    pub complaint_count:       u32,
    /// Complained and has not ordered again since.
    pub unrecovered_complaint: bool,
    pub last_experience:       Option<Experience>,
}

impl User {
    pub fn new(id: UserId, age_tier: AgeTier, proxy_purchase: bool, district: District, channel: Channel, day: Day) -> Self {
        Self {
            id,
            age_tier,
            proxy_purchase,
            district,
            channel,
            acquired_day: day,
            state: LifecycleState::Active,
            days_since_last_order: 0,
            days_since_signup: 0,
            order_count: 0,
            repeated: false,
            designated_escort: None,
            escort_history: Vec::new(),
            nps: None,
            complaint_count: 0,
            unrecovered_complaint: false,
            last_experience: None,
        }
    }

    /// An order was placed: back to active, recency zeroed.
    pub fn mark_ordered(&mut self) {
        self.state = LifecycleState::Active;
        self.days_since_last_order = 0;
        self.order_count += 1;
        self.repeated = self.order_count >= 2;
    }

    /// Put `escort` at the front of the history, keeping at most `depth` entries.
    pub fn remember_escort(&mut self, escort: EscortId, day: Day, depth: usize) {
        self.escort_history.retain(|v| v.escort != escort);
        self.escort_history.insert(0, EscortVisit { escort, day });
        self.escort_history.truncate(depth);
    }
}

/// Per-day cohort counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifecycleCounts {
    pub active:            u32,
    pub at_risk:           u32,
    pub silent:            u32,
    pub churned:           u32,
    /// Share of users with at least one order who ordered again.
    pub repeat_order_rate: f64,
    pub reactivated:       u32,
    pub newly_churned:     u32,
}

/// State implied by recency alone.
pub fn state_for_recency(days_since_last_order: u32, config: &LifecycleConfig) -> LifecycleState {
    if days_since_last_order >= config.churned_after_days {
        LifecycleState::Churned
    } else if days_since_last_order >= config.silent_after_days {
        LifecycleState::Silent
    } else if days_since_last_order >= config.at_risk_after_days {
        LifecycleState::AtRisk
    } else {
        LifecycleState::Active
    }
}

/// Reactivation probability for a dormant user on `day`: the weekly rate
/// on week boundaries, zero otherwise.
pub fn reactivation_probability(day: Day, weekly: f64) -> f64 {
    if is_week_end(day) { weekly } else { 0.0 }
}

pub struct LifecycleTracker {
    config: LifecycleConfig,
}

impl LifecycleTracker {
    pub fn new(config: LifecycleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn record_order(&self, user: &mut User) {
        user.mark_ordered();
    }

    /// Apply the day's transitions to every user, then age them one day.
    pub fn advance_day(&self, day: Day, users: &mut [User], rng: &mut SubsystemRng) -> (LifecycleCounts, Vec<SimEvent>) {
        let mut counts = LifecycleCounts::default();
        let mut events = Vec::new();
        let reactivation = reactivation_probability(day, self.config.weekly_reactivation);

        let mut ordered = 0u32;
        let mut repeated = 0u32;
        for user in users.iter_mut() {
            let target = user.state.max(state_for_recency(user.days_since_last_order, &self.config));
            if target == LifecycleState::Churned && user.state != LifecycleState::Churned {
                counts.newly_churned += 1;
                events.push(SimEvent::UserChurned { day, user_id: user.id });
            }
            user.state = target;

            if user.state != LifecycleState::Active && reactivation > 0.0 && rng.chance(reactivation) {
                events.push(SimEvent::UserReactivated { day, user_id: user.id, from: user.state });
                user.state = LifecycleState::Active;
                user.days_since_last_order = 0;
                counts.reactivated += 1;
            }

            match user.state {
                LifecycleState::Active  => counts.active += 1,
                LifecycleState::AtRisk  => counts.at_risk += 1,
                LifecycleState::Silent  => counts.silent += 1,
                LifecycleState::Churned => counts.churned += 1,
            }
            if user.order_count > 0 {
                ordered += 1;
                if user.repeated {
                    repeated += 1;
                }
            }

            user.days_since_last_order = user.days_since_last_order.saturating_add(1);
            user.days_since_signup = user.days_since_signup.saturating_add(1);
        }

        counts.repeat_order_rate = if ordered > 0 { repeated as f64 / ordered as f64 } else { 0.0 };
        log::debug!(
            "day={day} lifecycle: active={} at_risk={} silent={} churned={} reactivated={}",
            counts.active, counts.at_risk, counts.silent, counts.churned, counts.reactivated
        );
        (counts, events)
    }
}

impl SimSubsystem for LifecycleTracker {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        _events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let (counts, events) = self.advance_day(day, &mut market.users, rng);
        market.today.lifecycle = counts;
        Ok(events)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
