use escortsim_core::{
    conditions_subsystem::{demand_factor, recruitment_factor, MarketConditions, MIN_DEMAND_FACTOR},
    config::{PoachingEvent, PolicyRiskEvent, SimConfig},
    event::SimEvent,
    rng::SubsystemRng,
    types::Day,
    SimEngine,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn scheduled(name: &str, day: Day, duration_days: Day, demand_impact: f64, supply_impact: f64) -> PolicyRiskEvent {
    PolicyRiskEvent {
        name: name.to_string(),
        daily_probability: 0.0,
        scheduled_day: Some(day),
        demand_impact,
        supply_impact,
        duration_days,
    }
}

fn with_events(events: Vec<PolicyRiskEvent>) -> SimConfig {
    let mut config = SimConfig { total_days: 10, ..SimConfig::default_test() };
    config.policy.events = events;
    config
}

fn names(events: &[SimEvent]) -> Vec<(&'static str, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            SimEvent::PolicyEventStarted { name, .. } => Some(("started", name.clone())),
            SimEvent::PolicyEventEnded { name, .. } => Some(("ended", name.clone())),
            _ => None,
        })
        .collect()
}

// ── Factors ──────────────────────────────────────────────────────────────────

#[test]
fn demand_factor_is_floored_and_recruitment_never_negative() {
    assert_eq!(demand_factor(0.0), 1.0);
    assert!((demand_factor(-0.5) - 0.5).abs() < 1e-12);
    assert!((demand_factor(0.8) - 1.8).abs() < 1e-12);
    assert_eq!(demand_factor(-1.1), MIN_DEMAND_FACTOR);
    assert_eq!(recruitment_factor(-0.3 - 0.9), 0.0);
    assert!((recruitment_factor(-0.3) - 0.7).abs() < 1e-12);
}

// ── Event windows ────────────────────────────────────────────────────────────

#[test]
fn scheduled_event_runs_for_its_duration_then_ends() {
    let config = with_events(vec![scheduled("hospital_ban", 3, 4, -0.5, 0.0)]);
    let mut conditions = MarketConditions::new(&config);
    let mut rng = SubsystemRng::new(1, 7);

    let mut log = Vec::new();
    let mut in_force = Vec::new();
    for day in 1..=9 {
        log.extend(conditions.advance(day, &mut rng).into_iter().map(|e| (day, e)));
        if conditions.active_events().count() > 0 {
            in_force.push(day);
        }
    }
    assert_eq!(in_force, vec![3, 4, 5, 6]);

    let started = log.iter().find_map(|(day, e)| match e {
        SimEvent::PolicyEventStarted { until_day, .. } => Some((*day, *until_day)),
        _ => None,
    });
    assert_eq!(started, Some((3, 6)));
    let ended: Vec<Day> = log
        .iter()
        .filter(|(_, e)| matches!(e, SimEvent::PolicyEventEnded { .. }))
        .map(|(day, _)| *day)
        .collect();
    assert_eq!(ended, vec![7]);
}

#[test]
fn concurrent_impacts_add_up() {
    let config = with_events(vec![
        scheduled("hospital_ban", 1, 5, -0.5, 0.0),
        scheduled("licensing_rule", 2, 5, -0.3, -0.3),
    ]);
    let mut conditions = MarketConditions::new(&config);
    let mut rng = SubsystemRng::new(1, 7);

    conditions.advance(1, &mut rng);
    assert!((conditions.demand_modifier() + 0.5).abs() < 1e-12);
    assert_eq!(conditions.supply_modifier(), 0.0);

    conditions.advance(2, &mut rng);
    assert!((conditions.demand_modifier() + 0.8).abs() < 1e-12);
    assert!((conditions.supply_modifier() + 0.3).abs() < 1e-12);
    assert!((demand_factor(conditions.demand_modifier()) - 0.2).abs() < 1e-12);
}

#[test]
fn a_running_event_does_not_start_again() {
    let always = PolicyRiskEvent {
        name: "privacy_scandal".to_string(),
        daily_probability: 1.0,
        scheduled_day: None,
        demand_impact: -0.6,
        supply_impact: 0.0,
        duration_days: 3,
    };
    let mut conditions = MarketConditions::new(&with_events(vec![always]));
    let mut rng = SubsystemRng::new(2, 7);

    let mut log = Vec::new();
    for day in 1..=4 {
        log.extend(conditions.advance(day, &mut rng));
        assert_eq!(conditions.active_events().count(), 1, "day {day}");
    }
    // Ends after day 3 and is drawn again on day 4.
    assert_eq!(
        names(&log),
        vec![
            ("started", "privacy_scandal".to_string()),
            ("ended", "privacy_scandal".to_string()),
            ("started", "privacy_scandal".to_string()),
        ]
    );
}

#[test]
fn attrition_adds_running_poaching_campaigns() {
    let mut config = SimConfig::default_test();
    config.supply.monthly_attrition = 0.05;
    config.competition.poaching_events =
        vec![PoachingEvent { start_day: 3, end_day: 5, extra_monthly_attrition: 0.10 }];
    let conditions = MarketConditions::new(&config);

    assert!((conditions.attrition(2) - 0.05).abs() < 1e-12);
    assert!((conditions.attrition(4) - 0.15).abs() < 1e-12);
    assert!((conditions.attrition(6) - 0.05).abs() < 1e-12);
}

// ── Through the engine ───────────────────────────────────────────────────────

#[test]
fn demand_shock_shrinks_acquisition_and_is_reported_on_the_snapshot() {
    let mut calm = SimEngine::new(with_events(Vec::new()), 0, 31).expect("engine");
    let mut shocked = SimEngine::new(with_events(vec![scheduled("collapse", 1, 10, -1.0, 0.0)]), 0, 31).expect("engine");
    calm.run_to_end().unwrap();
    shocked.run_to_end().unwrap();

    assert!(shocked.snapshots().iter().all(|s| s.demand_factor == MIN_DEMAND_FACTOR));
    assert!(calm.snapshots().iter().all(|s| s.demand_factor == 1.0));

    let acquired = |engine: &SimEngine| engine.snapshots().iter().map(|s| s.new_users).sum::<u32>();
    assert!(acquired(&shocked) < acquired(&calm), "{} vs {}", acquired(&shocked), acquired(&calm));

    let started = shocked
        .event_log()
        .iter()
        .filter(|entry| matches!(entry.event, SimEvent::PolicyEventStarted { .. }))
        .map(|entry| (entry.day, entry.subsystem))
        .collect::<Vec<_>>();
    assert_eq!(started, vec![(1, "conditions")]);
}

#[test]
fn supply_shock_stops_recruitment_while_it_lasts() {
    let mut calm = SimEngine::new(with_events(Vec::new()), 0, 5).expect("engine");
    let mut frozen = SimEngine::new(with_events(vec![scheduled("licensing_rule", 1, 3, 0.0, -1.0)]), 0, 5).expect("engine");

    assert_eq!(calm.tick().unwrap().recruited, 2);
    let day1 = frozen.tick().unwrap();
    assert_eq!(day1.recruited, 0);
    assert_eq!(day1.demand_factor, 1.0);
    assert_eq!(frozen.supply().recruitment_factor(), 0.0);

    frozen.run_days(3).unwrap();
    assert_eq!(frozen.supply().recruitment_factor(), 1.0, "factor restored once the event ends");
}

#[test]
fn poaching_campaign_sets_the_roster_attrition_rate() {
    let mut config = SimConfig { total_days: 6, ..SimConfig::default_test() };
    config.competition.poaching_events =
        vec![PoachingEvent { start_day: 2, end_day: 3, extra_monthly_attrition: 0.20 }];
    let base = config.supply.monthly_attrition;
    let mut engine = SimEngine::new(config, 0, 3).expect("engine");

    let mut rates = Vec::new();
    for _ in 0..5 {
        engine.tick().unwrap();
        rates.push(engine.supply().attrition_rate());
    }
    let expected = [base, base + 0.20, base + 0.20, base, base];
    for (day, (rate, want)) in rates.iter().zip(expected).enumerate() {
        assert!((rate - want).abs() < 1e-12, "day {}: {rate} != {want}", day + 1);
    }
}

#[test]
fn shipped_policy_scenario_loads_with_rare_random_events() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/policy_risk.json");
    let config = SimConfig::load(path).expect("policy_risk.json");
    assert_eq!(config.policy.events.len(), 4);
    assert!(config.policy.events.iter().all(|e| e.scheduled_day.is_none() && e.daily_probability < 1e-4));

    let subsidy = config.policy.events.iter().find(|e| e.name == "insurance_subsidy").expect("subsidy");
    assert_eq!(subsidy.demand_impact, 0.8);
    assert_eq!(subsidy.duration_days, 365);
}
