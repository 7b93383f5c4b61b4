//! Full-horizon runs on the baseline configuration.

use escortsim_core::{
    complaint_subsystem::ComplaintFeedback,
    conditions_subsystem::MarketConditions,
    config::SimConfig,
    error::SimError,
    event::SimEvent,
    geo::District,
    monte_carlo::{run_simulation, ANNUALIZED_GMV_BAND},
    order::{Order, OrderState},
    rng::SubsystemSlot,
    snapshot::CohortSnapshot,
    types::{OrderId, TimeSlot, UserId},
    SimEngine,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn baseline_run_produces_one_snapshot_per_day() {
    init_logging();
    let config = SimConfig::default();
    let output = run_simulation(&config).expect("baseline run");

    assert_eq!(output.snapshots.len(), 90);
    for (i, snapshot) in output.snapshots.iter().enumerate() {
        assert_eq!(snapshot.day, i as u64 + 1);
        assert_eq!(
            snapshot.active + snapshot.at_risk + snapshot.silent + snapshot.churned,
            snapshot.total_users,
            "day {} states must partition the users",
            snapshot.day
        );
    }

    let last = output.snapshots.last().unwrap();
    assert!(last.churned > 0, "a 90-day run should churn someone");
    assert!(last.churned < last.total_users);
    assert_eq!(last.cumulative_gmv, output.final_gmv);
}

#[test]
fn baseline_gmv_lands_inside_the_sanity_band() {
    let output = run_simulation(&SimConfig::default()).expect("baseline run");
    let (low, high) = ANNUALIZED_GMV_BAND;
    assert!(
        low <= output.annualized_gmv && output.annualized_gmv <= high,
        "annualized {} outside [{low}, {high}]",
        output.annualized_gmv
    );
}

#[test]
fn every_order_is_resolved_and_matches_respect_the_ceiling() {
    init_logging();
    let config = SimConfig::default_test();
    let output = run_simulation(&config).expect("run");

    assert!(!output.order_log.is_empty());
    for order in &output.order_log {
        assert_ne!(order.state, OrderState::Pending, "order {} left pending", order.id);
        if order.state == OrderState::Matched {
            let commute = order.commute_minutes.expect("matched orders carry a commute");
            assert!(commute <= config.matching.commute_ceiling_minutes, "order {}: {commute}", order.id);
            assert!(order.escort.is_some());
        } else {
            assert!(order.escort.is_none());
            assert_eq!(order.gmv(), 0.0);
        }
    }

    let logged: f64 = output.order_log.iter().map(Order::net_gmv).sum();
    assert!((logged - output.final_gmv).abs() < 1e-3);
}

#[test]
fn order_for_unknown_user_is_a_data_inconsistency() {
    let mut engine = SimEngine::new(SimConfig::default_test(), 0, 1).expect("engine");
    let bogus = Order::new(OrderId(1), UserId(999_999), 1, District::Haidian, TimeSlot::Peak, 235.0);

    match engine.process_orders(1, vec![bogus]) {
        Err(SimError::DataInconsistency { day, detail }) => {
            assert_eq!(day, 1);
            assert!(detail.contains("u-999999"), "{detail}");
        }
        other => panic!("expected DataInconsistency, got {other:?}"),
    }
}

#[test]
fn engine_stops_at_the_horizon() {
    let config = SimConfig { total_days: 5, ..SimConfig::default_test() };
    let mut engine = SimEngine::new(config, 0, 3).expect("engine");
    engine.run_days(10).unwrap();
    assert_eq!(engine.snapshots().len(), 5);
    assert!(engine.clock.is_finished());
}

#[test]
fn ticking_past_the_horizon_is_an_error_and_changes_nothing() {
    let config = SimConfig { total_days: 2, ..SimConfig::default_test() };
    let mut engine = SimEngine::new(config, 0, 3).expect("engine");
    engine.tick().unwrap();
    engine.tick().unwrap();
    let orders = engine.order_log().len();

    match engine.tick() {
        Err(SimError::HorizonReached { total_days }) => assert_eq!(total_days, 2),
        other => panic!("expected HorizonReached, got {other:?}"),
    }
    assert_eq!(engine.clock.current_day, 2);
    assert_eq!(engine.snapshots().len(), 2);
    assert_eq!(engine.order_log().len(), orders);
}

// ── Subsystem registry ───────────────────────────────────────────────────────

#[test]
fn subsystems_run_in_the_documented_order() {
    let engine = SimEngine::new(SimConfig::default_test(), 0, 1).expect("engine");
    assert_eq!(
        engine.registered(),
        vec![
            (SubsystemSlot::Conditions, "conditions"),
            (SubsystemSlot::Demand, "demand"),
            (SubsystemSlot::Service, "matching"),
            (SubsystemSlot::Complaint, "complaint"),
            (SubsystemSlot::Referral, "referral"),
            (SubsystemSlot::Lifecycle, "lifecycle"),
            (SubsystemSlot::Supply, "supply"),
        ]
    );
    assert!(engine.subsystem::<ComplaintFeedback>().is_some());
    assert!(engine.subsystem::<MarketConditions>().is_some());
}

#[test]
fn events_are_logged_under_the_subsystem_that_emitted_them() {
    let mut engine = SimEngine::new(SimConfig::default_test(), 0, 5).expect("engine");
    engine.run_to_end().unwrap();

    assert!(!engine.event_log().is_empty());
    for entry in engine.event_log() {
        let expected = match entry.event {
            SimEvent::EscortRecruited { .. }
            | SimEvent::EscortPromoted { .. }
            | SimEvent::EscortFailedTraining { .. }
            | SimEvent::EscortDeparted { .. } => "supply",
            SimEvent::UserChurned { .. } | SimEvent::UserReactivated { .. } => "lifecycle",
            SimEvent::UserDesignatedEscort { .. } => "matching",
            SimEvent::ReferralAcquired { .. } => "demand",
            SimEvent::ComplaintFiled { .. } | SimEvent::ComplaintClosed { .. } => "complaint",
            SimEvent::PolicyEventStarted { .. } | SimEvent::PolicyEventEnded { .. } => "conditions",
        };
        assert_eq!(entry.subsystem, expected, "{:?}", entry.event);
    }
}

// ── Supply on the snapshot ───────────────────────────────────────────────────

#[test]
fn snapshot_supply_counts_match_the_event_log() {
    let config = SimConfig { total_days: 60, ..SimConfig::default_test() };
    let mut engine = SimEngine::new(config, 0, 11).expect("engine");
    engine.run_to_end().unwrap();

    let count = |pred: fn(&SimEvent) -> bool| engine.event_log().iter().filter(|e| pred(&e.event)).count() as u32;
    let snapshots = engine.snapshots();
    let sum = |f: fn(&CohortSnapshot) -> u32| snapshots.iter().map(f).sum::<u32>();

    assert_eq!(sum(|s| s.recruited), count(|e| matches!(e, SimEvent::EscortRecruited { .. })));
    assert_eq!(sum(|s| s.promoted), count(|e| matches!(e, SimEvent::EscortPromoted { .. })));
    assert_eq!(sum(|s| s.failed_training), count(|e| matches!(e, SimEvent::EscortFailedTraining { .. })));
    assert_eq!(sum(|s| s.departed), count(|e| matches!(e, SimEvent::EscortDeparted { .. })));
    assert_eq!(snapshots[0].recruited, 2, "week-1 rate of 2.0 needs no rounding draw");
    assert!(snapshots.iter().filter(|s| (s.day - 1) % 7 != 0).all(|s| s.recruited == 0));
}
