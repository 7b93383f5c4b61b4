//! Three-tier escort matching.
//!
//! Tiers, first success wins:
//!   1. Designated: the escort named on the order
//!   2. Historical: escorts who served this user before, most recent first
//!   3. Geographic: nearest available escort, ties to the lowest id
//!
//! Every tier applies the same availability checks (active, trained,
//! under daily capacity, no overlapping committed window) and the same
//! hard commute ceiling. A successful match commits the order window to
//! the escort's calendar, which is what keeps the escort from being
//! double-booked later the same day.
//!
//! As a daily stage (`MatchingSubsystem`), every pending order is either
//! cancelled by the user or matched, then the service outcome is drawn
//! and the user and escort are updated. Complaints are left to the next
//! stage.

use crate::{
    config::{MatchingConfig, ServiceConfig, SimConfig},
    error::{SimError, SimResult},
    event::SimEvent,
    geo::{commute_minutes, GeoIndex},
    lifecycle_subsystem::{EscortVisit, Experience},
    market::Market,
    order::{MatchResult, MatchTier, Order, OrderState, ServiceOutcome},
    rng::SubsystemRng,
    subsystem::SimSubsystem,
    supply_subsystem::{Escort, SupplyPool},
    types::{Day, EscortId},
};
use serde::{Deserialize, Serialize};
use std::any::Any;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub designated: u32,
    pub historical: u32,
    pub geographic: u32,
    pub unmatched:  u32,
}

impl MatchStats {
    pub fn matched(&self) -> u32 {
        self.designated + self.historical + self.geographic
    }

    pub fn record(&mut self, tier: MatchTier) {
        match tier {
            MatchTier::Designated => self.designated += 1,
            MatchTier::Historical => self.historical += 1,
            MatchTier::Geographic => self.geographic += 1,
            MatchTier::Unmatched  => self.unmatched += 1,
        }
    }
}

pub struct MatchingEngine {
    geo:     GeoIndex,
    config:  MatchingConfig,
    /// Running totals for the whole trial.
    pub stats: MatchStats,
}

impl MatchingEngine {
    pub fn new(geo: GeoIndex, config: MatchingConfig) -> Self {
        Self { geo, config, stats: MatchStats::default() }
    }

    /// Assign an escort to `order` or declare it unmatched.
    ///
    /// `history` is the requesting user's past escorts, most recent first.
    pub fn resolve(&mut self, order: &Order, history: &[EscortVisit], pool: &mut SupplyPool, day: Day) -> MatchResult {
        let result = self.select(order, history, pool);
        if let Some(escort_id) = result.escort {
            if let Some(escort) = pool.get_mut(escort_id) {
                escort.commit(order.window);
            }
        }
        self.stats.record(result.tier);
        log::trace!("day={day} matching: order={} tier={:?} escort={:?}", order.id, result.tier, result.escort);
        result
    }

    fn select(&self, order: &Order, history: &[EscortVisit], pool: &SupplyPool) -> MatchResult {
        if let Some(designated) = order.designated_hint {
            if let Some(result) = self.try_escort(order, designated, pool, MatchTier::Designated) {
                return result;
            }
        }

        for visit in history {
            if Some(visit.escort) == order.designated_hint {
                continue;
            }
            if let Some(result) = self.try_escort(order, visit.escort, pool, MatchTier::Historical) {
                return result;
            }
        }

        let mut best: Option<(f64, EscortId)> = None;
        for escort in pool.iter() {
            let Some((distance, _)) = self.viable(order, escort, pool) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_distance, best_id)) => {
                    distance.total_cmp(&best_distance).then(escort.id.cmp(&best_id)).is_lt()
                }
            };
            if better {
                best = Some((distance, escort.id));
            }
        }
        match best {
            Some((distance, escort_id)) => MatchResult::assigned(
                escort_id,
                distance,
                commute_minutes(distance, self.config.average_speed_kmh),
                MatchTier::Geographic,
            ),
            None => MatchResult::unmatched(),
        }
    }

    fn try_escort(&self, order: &Order, escort_id: EscortId, pool: &SupplyPool, tier: MatchTier) -> Option<MatchResult> {
        let escort = pool.get(escort_id)?;
        let (distance, commute) = self.viable(order, escort, pool)?;
        Some(MatchResult::assigned(escort_id, distance, commute, tier))
    }

    /// Distance and commute if `escort` can take `order`.
    fn viable(&self, order: &Order, escort: &Escort, pool: &SupplyPool) -> Option<(f64, f64)> {
        if !escort.can_take(&order.window, pool.config()) {
            return None;
        }
        let distance = self.geo.distance_km(escort.home_district, order.district);
        let commute = commute_minutes(distance, self.config.average_speed_kmh);
        if commute > self.config.commute_ceiling_minutes {
            return None;
        }
        Some((distance, commute))
    }
}

pub fn draw_service(config: &ServiceConfig, rng: &mut SubsystemRng) -> ServiceOutcome {
    if rng.chance(config.success_rate) {
        let rating = rng.normal(config.rating_mean, config.rating_std).clamp(1.0, 5.0);
        ServiceOutcome { completed: true, rating: Some(rating) }
    } else {
        ServiceOutcome { completed: false, rating: None }
    }
}

pub struct MatchingSubsystem {
    pub engine:        MatchingEngine,
    service:           ServiceConfig,
    cancellation_rate: f64,
}

impl MatchingSubsystem {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            engine:            MatchingEngine::new(GeoIndex::new(), config.matching.clone()),
            service:           config.service.clone(),
            cancellation_rate: config.demand.cancellation_rate,
        }
    }

    /// Apply a resolved order to its user and, if served, its escort.
    fn record_outcome(&self, day: Day, market: &mut Market, order: &Order) -> SimResult<Option<SimEvent>> {
        let depth = self.engine.config.history_depth;
        let threshold = self.engine.config.designation_rating_threshold;
        let user = market
            .users
            .get_mut(order.user.0 as usize)
            .ok_or_else(|| SimError::inconsistency(day, format!("unknown user {}", order.user)))?;

        user.mark_ordered();
        if order.state == OrderState::Cancelled {
            return Ok(None);
        }

        let rating = order.service.and_then(|s| s.rating);
        user.last_experience = Some(Experience {
            day,
            tier: order.tier.unwrap_or(MatchTier::Unmatched),
            served: order.is_completed(),
            rating,
        });

        let (true, Some(escort_id)) = (order.is_completed(), order.escort) else {
            return Ok(None);
        };
        user.remember_escort(escort_id, day, depth);
        let escort = market.supply.get_mut(escort_id).ok_or_else(|| {
            SimError::inconsistency(day, format!("order {} served by unknown escort {escort_id}", order.id))
        })?;
        escort.completed_orders += 1;

        if !rating.is_some_and(|r| r >= threshold) || user.designated_escort == Some(escort_id) {
            return Ok(None);
        }
        escort.designated_clients.insert(user.id);
        let previous = user.designated_escort.replace(escort_id);
        if let Some(prev) = previous.and_then(|id| market.supply.get_mut(id)) {
            prev.designated_clients.remove(&user.id);
        }
        Ok(Some(SimEvent::UserDesignatedEscort { day, user_id: user.id, escort_id }))
    }
}

impl SimSubsystem for MatchingSubsystem {
    fn name(&self) -> &'static str {
        "matching"
    }

    /// Settle the day's pending orders. An order for a user that does not
    /// exist aborts the tick.
    fn update(
        &mut self,
        day: Day,
        market: &mut Market,
        _events_in: &[SimEvent],
        rng: &mut SubsystemRng,
    ) -> SimResult<Vec<SimEvent>> {
        let mut events = Vec::new();

        for order in std::mem::take(&mut market.today.pending) {
            let Some(user) = market.users.get(order.user.0 as usize) else {
                return Err(SimError::inconsistency(
                    day,
                    format!("order {} references unknown user {}", order.id, order.user),
                ));
            };

            let resolved = if rng.chance(self.cancellation_rate) {
                order.cancel()?
            } else {
                let result = self.engine.resolve(&order, &user.escort_history, &mut market.supply, day);
                let service = result.matched.then(|| draw_service(&self.service, rng));
                order.resolve(&result, service)?
            };
            events.extend(self.record_outcome(day, market, &resolved)?);

            let outcome = &mut market.today.outcome;
            outcome.orders += 1;
            match resolved.state {
                OrderState::Matched   => outcome.matched += 1,
                OrderState::Cancelled => outcome.cancelled += 1,
                OrderState::Unmatched | OrderState::Pending => {}
            }
            if resolved.is_completed() {
                outcome.completed += 1;
            }
            outcome.gmv += resolved.gmv();
            market.today.resolved.push(resolved);
        }

        let outcome = &market.today.outcome;
        log::debug!(
            "day={day} matching: orders={} matched={} cancelled={} completed={}",
            outcome.orders, outcome.matched, outcome.cancelled, outcome.completed
        );
        Ok(events)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
