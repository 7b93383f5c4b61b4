use escortsim_core::{
    config::{CompetitionConfig, PoachingEvent, SupplyConfig},
    event::SimEvent,
    geo::District,
    rng::SubsystemRng,
    supply_subsystem::{recruitment_rate, SupplyPool, TrainingTier},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// No recruitment, no attrition, deterministic training gates.
fn quiet_config(pass_rate: f64) -> SupplyConfig {
    SupplyConfig {
        week1_recruitment: 0.0,
        monthly_attrition: 0.0,
        training_pass_rate: pass_rate,
        ..SupplyConfig::default()
    }
}

fn run_days(pool: &mut SupplyPool, days: std::ops::RangeInclusive<u64>) -> Vec<SimEvent> {
    let mut rng = SubsystemRng::new(17, 0);
    let mut events = Vec::new();
    for day in days {
        let (_, mut today) = pool.evolve(day, &mut rng);
        events.append(&mut today);
    }
    events
}

// ── Recruitment decay ────────────────────────────────────────────────────────

#[test]
fn week_52_rate_is_exactly_forty_percent_of_week_1() {
    let week1 = recruitment_rate(1, 20.0, 0.4, 52);
    assert_eq!(week1, 20.0);
    assert_eq!(recruitment_rate(52, 20.0, 0.4, 52), week1 * 0.4);
}

#[test]
fn recruitment_never_increases_and_holds_the_floor() {
    let mut previous = f64::INFINITY;
    for week in 1..=120 {
        let rate = recruitment_rate(week, 20.0, 0.4, 52);
        assert!(rate <= previous, "week {week}: {rate} > {previous}");
        previous = rate;
    }
    let floor = recruitment_rate(52, 20.0, 0.4, 52);
    for week in 53..=200 {
        assert_eq!(recruitment_rate(week, 20.0, 0.4, 52), floor);
    }
}

#[test]
fn recruitment_happens_on_week_starts_only() {
    let config = SupplyConfig { week1_recruitment: 3.0, monthly_attrition: 0.0, ..SupplyConfig::default() };
    let mut pool = SupplyPool::new(config);
    let mut rng = SubsystemRng::new(3, 0);

    let (day1, _) = pool.evolve(1, &mut rng);
    assert_eq!(day1.recruited, 3, "an integral rate needs no rounding draw");
    for day in 2..=7 {
        let (change, _) = pool.evolve(day, &mut rng);
        assert_eq!(change.recruited, 0, "day {day}");
    }
    assert!(pool.iter().all(|e| e.tier == TrainingTier::Trainee));
}

// ── Training pipeline ────────────────────────────────────────────────────────

#[test]
fn trainees_become_basic_after_seven_days_then_certified_after_21() {
    let mut pool = SupplyPool::new(quiet_config(1.0));
    let id = pool.enroll(District::Haidian, TrainingTier::Trainee, 1);

    run_days(&mut pool, 2..=7);
    assert_eq!(pool.get(id).unwrap().tier, TrainingTier::Trainee);

    run_days(&mut pool, 8..=8);
    assert_eq!(pool.get(id).unwrap().tier, TrainingTier::Basic);

    run_days(&mut pool, 9..=28);
    assert_eq!(pool.get(id).unwrap().tier, TrainingTier::Basic);

    let events = run_days(&mut pool, 29..=29);
    assert_eq!(pool.get(id).unwrap().tier, TrainingTier::Certified);
    assert!(matches!(events[0], SimEvent::EscortPromoted { tier: TrainingTier::Certified, .. }));
}

#[test]
fn failed_trainees_leave_the_pool() {
    let mut pool = SupplyPool::new(quiet_config(0.0));
    let id = pool.enroll(District::Tongzhou, TrainingTier::Trainee, 1);

    let events = run_days(&mut pool, 2..=8);
    assert!(pool.get(id).is_none());
    assert!(pool.is_empty());
    assert!(events.iter().any(|e| matches!(e, SimEvent::EscortFailedTraining { .. })));
}

#[test]
fn failed_certification_keeps_escort_basic() {
    let mut pool = SupplyPool::new(quiet_config(0.0));
    let id = pool.enroll(District::Chaoyang, TrainingTier::Basic, 0);

    run_days(&mut pool, 1..=60);
    let escort = pool.get(id).unwrap();
    assert_eq!(escort.tier, TrainingTier::Basic);
    assert!(escort.certification_attempted);
    assert!(escort.active);
}

// ── Attrition ────────────────────────────────────────────────────────────────

#[test]
fn zero_attrition_keeps_everyone() {
    let mut pool = SupplyPool::new(quiet_config(1.0));
    for _ in 0..20 {
        pool.enroll(District::Xicheng, TrainingTier::Certified, 0);
    }
    run_days(&mut pool, 1..=90);
    assert_eq!(pool.active_count(), 20);
}

#[test]
fn attrition_input_is_mutable_and_clamped() {
    let mut pool = SupplyPool::new(quiet_config(1.0));
    assert_eq!(pool.attrition_rate(), 0.0);
    pool.set_attrition_rate(0.5);
    assert_eq!(pool.attrition_rate(), 0.5);
    pool.set_attrition_rate(7.0);
    assert_eq!(pool.attrition_rate(), 1.0);

    for _ in 0..50 {
        pool.enroll(District::Fengtai, TrainingTier::Basic, 0);
    }
    run_days(&mut pool, 1..=60);
    assert!(pool.active_count() < 50, "some escorts should have left");
    assert_eq!(pool.len(), 50, "departed escorts stay on the roster");
}

#[test]
fn poaching_events_add_attrition_inside_their_window() {
    let competition = CompetitionConfig {
        poaching_events: vec![
            PoachingEvent { start_day: 10, end_day: 20, extra_monthly_attrition: 0.05 },
            PoachingEvent { start_day: 15, end_day: 30, extra_monthly_attrition: 0.10 },
        ],
    };
    assert_eq!(competition.extra_attrition(9), 0.0);
    assert_eq!(competition.extra_attrition(10), 0.05);
    assert!((competition.extra_attrition(15) - 0.15).abs() < 1e-12);
    assert_eq!(competition.extra_attrition(30), 0.10);
    assert_eq!(competition.extra_attrition(31), 0.0);
}

#[test]
fn seeded_roster_is_trained() {
    let mut pool = SupplyPool::new(SupplyConfig::default());
    let mut rng = SubsystemRng::new(1, 6);
    pool.seed_initial(&mut rng);
    assert_eq!(pool.len(), 120);
    assert_eq!(pool.servable_count(), 120);
}
