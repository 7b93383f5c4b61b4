//! sim-runner: headless Monte Carlo runner for the escort marketplace.
//!
//! Usage:
//!   sim-runner --seed 12345 --days 90 --trials 200
//!   sim-runner --config data/baseline.json --db run.db --json out.json

mod store;

use anyhow::Result;
use escortsim_core::{
    config::SimConfig,
    monte_carlo::{run_simulation, ScenarioBand, SimulationOutput, ANNUALIZED_GMV_BAND},
};
use std::env;
use store::ExportStore;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = find_arg(&args, "--config");
    let db = find_arg(&args, "--db");
    let json = find_arg(&args, "--json");

    let mut config = match config_path {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    config.random_seed = parse_arg(&args, "--seed", config.random_seed);
    config.total_days = parse_arg(&args, "--days", config.total_days);
    config.num_trials = parse_arg(&args, "--trials", config.num_trials);

    println!("Escort marketplace simulator: sim-runner");
    println!("  seed:      {}", config.random_seed);
    println!("  days:      {}", config.total_days);
    println!("  trials:    {}", config.num_trials);
    println!("  config:    {}", config_path.unwrap_or("(baseline)"));
    println!("  db:        {}", db.unwrap_or("(none)"));
    println!();

    let output = run_simulation(&config)?;
    print_summary(&output);

    if let Some(path) = json {
        std::fs::write(path, serde_json::to_string_pretty(&output)?)?;
        log::info!("wrote simulation output to {path}");
    }

    if let Some(path) = db {
        let mut store = ExportStore::open(path)?;
        store.migrate()?;
        let run_id = store.export(&config, &output)?;
        println!();
        println!("  exported run {run_id} to {path}");
    }

    Ok(())
}

fn print_summary(output: &SimulationOutput) {
    let last = output.snapshots.last();

    println!("=== RUN SUMMARY (trial {}) ===", output.reference_trial);
    println!("  days run:       {}", output.snapshots.len());
    println!("  trials:         {} ok / {} failed", output.completed_trials, output.failed_trials);
    if let Some(s) = last {
        println!("  users:          {}", s.total_users);
        println!("  active:         {}", s.active);
        println!("  at risk:        {}", s.at_risk);
        println!("  silent:         {}", s.silent);
        println!("  churned:        {} ({:.1}%)", s.churned, s.churned_fraction() * 100.0);
        println!("  repeat rate:    {:.1}%", s.repeat_order_rate * 100.0);
        println!("  nps:            {:.1}", s.nps);
        println!("  escorts:        {}", s.servable_escorts);
        println!("  acq. spend:     {:.0}", s.acquisition_spend);
    }
    let orders: u32 = output.snapshots.iter().map(|s| s.orders).sum();
    let matched: u32 = output.snapshots.iter().map(|s| s.matched).sum();
    println!("  total orders:   {orders}");
    println!("  matched:        {matched}");
    let refunds: f64 = output.snapshots.iter().map(|s| s.compensation).sum();
    println!("  refunds:        {refunds:.0}");
    println!("  gmv (net):      {:.0}", output.final_gmv);
    println!("  annualized gmv: {:.0}", output.annualized_gmv);

    let (low, high) = ANNUALIZED_GMV_BAND;
    if output.annualized_gmv < low || output.annualized_gmv > high {
        log::warn!("annualized gmv {:.0} is outside the sanity band [{low:.0}, {high:.0}]", output.annualized_gmv);
    }

    println!();
    println!("=== SCENARIO BANDS (P10 / P50 / P90) ===");
    let b = &output.scenario_bands;
    print_band("final gmv", &b.final_gmv);
    print_band("annualized gmv", &b.annualized_gmv);
    print_band("active users", &b.final_active_users);
    print_band("churned users", &b.final_churned_users);
    print_band("match success", &b.mean_match_success);
    print_band("nps", &b.final_nps);

    for failure in &output.failures {
        println!("  trial {} failed: {}", failure.trial, failure.error);
    }
}

fn print_band(name: &str, band: &ScenarioBand) {
    println!(
        "  {name:<15} | {:>14.2} | {:>14.2} | {:>14.2}",
        band.conservative, band.neutral, band.optimistic
    );
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn find_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}
