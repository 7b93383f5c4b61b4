//! Same configuration, same seed: byte-identical output.
//! Any divergence is a blocker.

use escortsim_core::{config::SimConfig, monte_carlo::run_trial};

fn config(seed: u64) -> SimConfig {
    SimConfig { random_seed: seed, ..SimConfig::default_test() }
}

#[test]
fn same_seed_produces_identical_snapshots_and_order_logs() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let a = run_trial(&config(SEED), 0).expect("trial a");
    let b = run_trial(&config(SEED), 0).expect("trial b");

    let snaps_a = serde_json::to_string(&a.snapshots).expect("serialize a");
    let snaps_b = serde_json::to_string(&b.snapshots).expect("serialize b");
    assert_eq!(snaps_a, snaps_b, "snapshot sequences diverged");

    assert_eq!(a.order_log.len(), b.order_log.len());
    for (i, (x, y)) in a.order_log.iter().zip(b.order_log.iter()).enumerate() {
        assert_eq!(x, y, "order log diverged at entry {i}");
    }
    assert_eq!(a.event_log, b.event_log);
}

#[test]
fn different_seeds_produce_different_runs() {
    let a = run_trial(&config(42), 0).expect("trial a");
    let b = run_trial(&config(99), 0).expect("trial b");

    let snaps_a = serde_json::to_string(&a.snapshots).unwrap();
    let snaps_b = serde_json::to_string(&b.snapshots).unwrap();
    assert_ne!(snaps_a, snaps_b, "different seeds produced identical snapshots; seed is not being used");
}

#[test]
fn trial_index_changes_the_stream() {
    let cfg = config(7);
    let first = run_trial(&cfg, 0).unwrap();
    let second = run_trial(&cfg, 1).unwrap();
    assert_ne!(first.seed, second.seed);
    assert_eq!(first.seed, 7, "trial 0 runs on the base seed");
    assert_ne!(first.summary.final_gmv, second.summary.final_gmv);
}
