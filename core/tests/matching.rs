use escortsim_core::{
    config::{MatchingConfig, SupplyConfig},
    geo::{commute_minutes, District, GeoIndex},
    lifecycle_subsystem::EscortVisit,
    matching_subsystem::MatchingEngine,
    order::{MatchTier, Order},
    supply_subsystem::{SupplyPool, TrainingTier},
    types::{EscortId, OrderId, TimeSlot, UserId},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn pool() -> SupplyPool {
    SupplyPool::new(SupplyConfig::default())
}

fn matcher() -> MatchingEngine {
    MatchingEngine::new(GeoIndex::new(), MatchingConfig::default())
}

fn order(id: u64, district: District, slot: TimeSlot) -> Order {
    Order::new(OrderId(id), UserId(1), 1, district, slot, 235.0)
}

fn visit(escort: EscortId) -> EscortVisit {
    EscortVisit { escort, day: 1 }
}

// ── Tier precedence ──────────────────────────────────────────────────────────

/// A viable designated escort wins even when a closer escort is free.
#[test]
fn designated_escort_wins_over_closer_candidates() {
    let mut pool = pool();
    let far = pool.enroll(District::Haidian, TrainingTier::Basic, 0);
    let near = pool.enroll(District::Dongcheng, TrainingTier::Basic, 0);
    let mut engine = matcher();

    let o = order(1, District::Dongcheng, TimeSlot::Peak).with_designated(Some(far));
    let result = engine.resolve(&o, &[visit(near)], &mut pool, 1);

    assert!(result.matched);
    assert_eq!(result.escort, Some(far));
    assert_eq!(result.tier, MatchTier::Designated);
    assert!(result.distance_km.unwrap() > 0.0);
}

/// A designated escort already booked for an overlapping window falls
/// through to the user's history, most recent first.
#[test]
fn busy_designated_escort_falls_through_to_history() {
    let mut pool = pool();
    let designated = pool.enroll(District::Chaoyang, TrainingTier::Certified, 0);
    let older = pool.enroll(District::Chaoyang, TrainingTier::Basic, 0);
    let recent = pool.enroll(District::Xicheng, TrainingTier::Basic, 0);
    let mut engine = matcher();

    let first = order(1, District::Chaoyang, TimeSlot::Peak);
    let booked = engine.resolve(&first.with_designated(Some(designated)), &[], &mut pool, 1);
    assert_eq!(booked.escort, Some(designated));

    let second = order(2, District::Chaoyang, TimeSlot::Peak).with_designated(Some(designated));
    let history = [visit(designated), visit(recent), visit(older)];
    let result = engine.resolve(&second, &history, &mut pool, 1);

    assert_eq!(result.tier, MatchTier::Historical);
    assert_eq!(result.escort, Some(recent), "most recent past escort should be tried first");
}

/// A departed designated escort is a normal fall-through, not an error.
#[test]
fn departed_designated_escort_falls_through() {
    let mut pool = pool();
    let designated = pool.enroll(District::Fengtai, TrainingTier::Basic, 0);
    let other = pool.enroll(District::Fengtai, TrainingTier::Basic, 0);
    pool.get_mut(designated).unwrap().active = false;
    let mut engine = matcher();

    let o = order(1, District::Fengtai, TimeSlot::Midday).with_designated(Some(designated));
    let result = engine.resolve(&o, &[], &mut pool, 1);

    assert_eq!(result.tier, MatchTier::Geographic);
    assert_eq!(result.escort, Some(other));
}

/// A designated hint naming an escort no longer on the roster is ignored.
#[test]
fn unknown_designated_escort_is_ignored() {
    let mut pool = pool();
    let only = pool.enroll(District::Haidian, TrainingTier::Basic, 0);
    let mut engine = matcher();

    let o = order(1, District::Haidian, TimeSlot::Peak).with_designated(Some(EscortId(999)));
    let result = engine.resolve(&o, &[], &mut pool, 1);

    assert_eq!(result.escort, Some(only));
    assert_eq!(result.tier, MatchTier::Geographic);
}

// ── Geographic tier ──────────────────────────────────────────────────────────

#[test]
fn geographic_tier_picks_the_nearest_escort() {
    let mut pool = pool();
    let _far = pool.enroll(District::Daxing, TrainingTier::Basic, 0);
    let near = pool.enroll(District::Xicheng, TrainingTier::Basic, 0);
    let mut engine = matcher();

    let result = engine.resolve(&order(1, District::Dongcheng, TimeSlot::Peak), &[], &mut pool, 1);

    assert_eq!(result.escort, Some(near));
    assert_eq!(result.tier, MatchTier::Geographic);
}

/// Equal distances resolve to the lowest identity, and a booked escort is
/// not reused for an overlapping window.
#[test]
fn ties_go_to_lowest_id_and_bookings_block_reuse() {
    let mut pool = pool();
    let first = pool.enroll(District::Haidian, TrainingTier::Basic, 0);
    let second = pool.enroll(District::Haidian, TrainingTier::Basic, 0);
    let mut engine = matcher();

    let a = engine.resolve(&order(1, District::Haidian, TimeSlot::Peak), &[], &mut pool, 1);
    let b = engine.resolve(&order(2, District::Haidian, TimeSlot::Peak), &[], &mut pool, 1);
    let c = engine.resolve(&order(3, District::Haidian, TimeSlot::Peak), &[], &mut pool, 1);

    assert_eq!(a.escort, Some(first));
    assert_eq!(b.escort, Some(second));
    assert!(!c.matched, "both escorts are booked for the peak window");
    assert_eq!(c.tier, MatchTier::Unmatched);
    assert_eq!(engine.stats.matched(), 2);
    assert_eq!(engine.stats.unmatched, 1);
}

/// Basic escorts take at most two orders a day even when windows don't overlap.
#[test]
fn daily_capacity_limits_non_overlapping_bookings() {
    let mut pool = pool();
    let escort = pool.enroll(District::Chaoyang, TrainingTier::Basic, 0);
    let mut engine = matcher();

    let peak = engine.resolve(&order(1, District::Chaoyang, TimeSlot::Peak), &[], &mut pool, 1);
    let midday = engine.resolve(&order(2, District::Chaoyang, TimeSlot::Midday), &[], &mut pool, 1);
    let afternoon = engine.resolve(&order(3, District::Chaoyang, TimeSlot::Afternoon), &[], &mut pool, 1);

    assert_eq!(peak.escort, Some(escort));
    assert_eq!(midday.escort, Some(escort));
    assert!(!afternoon.matched);
    assert_eq!(pool.get(escort).unwrap().calendar.len(), 2);

    pool.begin_day();
    let next_day = engine.resolve(&order(4, District::Chaoyang, TimeSlot::Afternoon), &[], &mut pool, 2);
    assert_eq!(next_day.escort, Some(escort), "calendars reset each day");
}

#[test]
fn trainees_are_never_matched() {
    let mut pool = pool();
    pool.enroll(District::Xicheng, TrainingTier::Trainee, 0);
    let mut engine = matcher();

    let result = engine.resolve(&order(1, District::Xicheng, TimeSlot::Evening), &[], &mut pool, 1);
    assert!(!result.matched);
}

// ── Commute ceiling ──────────────────────────────────────────────────────────

/// The only candidate is over 90 minutes away: unmatched, in every tier.
#[test]
fn candidates_beyond_the_commute_ceiling_are_excluded() {
    let mut pool = pool();
    let remote = pool.enroll(District::Yanqing, TrainingTier::Certified, 0);
    let mut engine = matcher();

    let plain = engine.resolve(&order(1, District::Pinggu, TimeSlot::Peak), &[], &mut pool, 1);
    assert!(!plain.matched);

    let hinted = order(2, District::Pinggu, TimeSlot::Peak).with_designated(Some(remote));
    let result = engine.resolve(&hinted, &[visit(remote)], &mut pool, 1);
    assert!(!result.matched, "the ceiling applies to designated escorts too");
    assert!(pool.get(remote).unwrap().calendar.is_empty());
}

/// A commute exactly at the ceiling is allowed; a hair above is not.
#[test]
fn commute_ceiling_is_an_exact_cutoff() {
    let geo = GeoIndex::new();
    let distance = geo.distance_km(District::Tongzhou, District::Haidian);
    let at_ceiling = commute_minutes(distance, 25.0);

    let exact = MatchingConfig { commute_ceiling_minutes: at_ceiling, ..MatchingConfig::default() };
    let mut pool_a = pool();
    pool_a.enroll(District::Tongzhou, TrainingTier::Basic, 0);
    let mut engine = MatchingEngine::new(GeoIndex::new(), exact);
    let result = engine.resolve(&order(1, District::Haidian, TimeSlot::Peak), &[], &mut pool_a, 1);
    assert!(result.matched);
    assert!(result.commute_minutes.unwrap() <= at_ceiling);

    let tight = MatchingConfig { commute_ceiling_minutes: at_ceiling - 0.01, ..MatchingConfig::default() };
    let mut pool_b = pool();
    pool_b.enroll(District::Tongzhou, TrainingTier::Basic, 0);
    let mut engine = MatchingEngine::new(GeoIndex::new(), tight);
    let result = engine.resolve(&order(1, District::Haidian, TimeSlot::Peak), &[], &mut pool_b, 1);
    assert!(!result.matched);
}
